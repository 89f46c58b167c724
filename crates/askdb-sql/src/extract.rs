//! Lexical identifier extraction.
//!
//! This is a lexical walk, not a full parse. It goes over the token stream and picks
//! out three kinds of references:
//!
//! - qualified columns: every `qualifier.identifier` chain (the last part),
//! - unqualified columns: identifiers in each `SELECT [DISTINCT] [TOP n] <list>`
//!   select list,
//! - tables: the (possibly schema-qualified) names in each FROM clause, read
//!   after `FROM` and after every comma, `JOIN` and `APPLY`. Parenthesised joins
//!   are walked; anything else in table position fails the extraction.
//!
//! Comments, string literals and numbers never produce identifiers. Known
//! approximations: ORDER BY / WHERE / GROUP BY are only checked through their
//! qualified references, and function arguments that are not columns (e.g. the
//! `year` in `DATEPART(year, d)`) are reported as columns.

use std::collections::{BTreeSet, HashSet};

use sqlparser::tokenizer::Token;

use crate::lexer::{ident, is_any_keyword, is_keyword, significant_tokens};
use crate::{fold_case, SqlError};

/// Words that end a select list when seen outside parentheses.
const LIST_TERMINATORS: &[&str] = &[
    "FROM", "INTO", "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "EXCEPT", "INTERSECT", "OPTION",
];

/// Words that end a FROM clause when seen outside parentheses.
const FROM_TERMINATORS: &[&str] = &[
    "WHERE", "GROUP", "HAVING", "ORDER", "UNION", "EXCEPT", "INTERSECT", "OPTION", "LIMIT",
    "OFFSET", "FETCH", "WINDOW",
];

/// Unquoted words that cannot name a table.
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "CROSS", "ON", "GROUP", "ORDER",
    "HAVING", "UNION", "EXCEPT", "INTERSECT", "WITH", "OPTION", "FOR", "LIMIT", "OFFSET", "FETCH",
    "WINDOW", "APPLY", "PIVOT", "UNPIVOT", "NATURAL", "USING", "INTO", "SELECT",
];

/// Unquoted words inside a select item that are syntax, not identifiers.
const EXPRESSION_WORDS: &[&str] = &[
    "AS", "CASE", "WHEN", "THEN", "ELSE", "END", "AND", "OR", "NOT", "NULL", "IS", "IN", "LIKE",
    "BETWEEN", "DISTINCT", "ALL", "OVER", "PARTITION", "BY", "ORDER", "ASC", "DESC", "TRUE",
    "FALSE", "EXISTS", "ROWS", "RANGE", "UNBOUNDED", "PRECEDING", "FOLLOWING", "CURRENT", "ROW",
    "COLLATE", "ESCAPE", "SOME", "ANY", "FROM",
];

/// Identifiers referenced by one query. Names are folded with [`fold_case`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct References {
    /// Column identifiers; `*` is never included.
    pub columns: BTreeSet<String>,
    /// Table identifiers read from FROM clauses.
    pub tables: BTreeSet<String>,
}

pub fn extract_references(sql: &str) -> Result<References, SqlError> {
    let tokens = significant_tokens(sql)?;
    ensure_single_statement(&tokens)?;
    if !is_keyword(tokens.first(), "SELECT") {
        return Err(SqlError::NotSelect);
    }

    let in_query = query_contexts(&tokens);
    let mut refs = References::default();
    let table_positions = collect_tables(&tokens, &in_query, &mut refs)?;
    collect_qualified_columns(&tokens, &table_positions, &mut refs);
    collect_select_lists(&tokens, &in_query, &mut refs);
    Ok(refs)
}

fn ensure_single_statement(tokens: &[Token]) -> Result<(), SqlError> {
    let Some(first_semi) = tokens.iter().position(|t| matches!(t, Token::SemiColon)) else {
        return Ok(());
    };
    if tokens[first_semi..]
        .iter()
        .all(|t| matches!(t, Token::SemiColon))
    {
        Ok(())
    } else {
        Err(SqlError::MultipleStatements)
    }
}

/// For each token: is its innermost enclosing group a query (the statement
/// itself or a `(SELECT ...)` subquery) rather than a function call or
/// expression? `FROM` inside `EXTRACT(year FROM d)` must not count as a table
/// clause.
fn query_contexts(tokens: &[Token]) -> Vec<bool> {
    let mut stack = vec![true];
    let mut out = Vec::with_capacity(tokens.len());
    for (i, tok) in tokens.iter().enumerate() {
        let current = stack.last().copied().unwrap_or(true);
        match tok {
            Token::LParen => {
                out.push(current);
                stack.push(is_keyword(tokens.get(i + 1), "SELECT"));
            }
            Token::RParen => {
                if stack.len() > 1 {
                    stack.pop();
                }
                out.push(stack.last().copied().unwrap_or(true));
            }
            _ => out.push(current),
        }
    }
    out
}

fn collect_tables(
    tokens: &[Token],
    in_query: &[bool],
    refs: &mut References,
) -> Result<HashSet<usize>, SqlError> {
    let mut positions = HashSet::new();
    for i in 0..tokens.len() {
        // Subqueries inside a FROM clause are reached through their own `FROM`.
        if in_query[i] && is_keyword(tokens.get(i), "FROM") {
            read_from_clause(tokens, i + 1, refs, &mut positions)?;
        }
    }
    Ok(positions)
}

/// Scan a FROM clause starting at `j` up to its end keyword, the `)` closing
/// its group, or the end of input. A table is read after `FROM` and after every
/// comma, `JOIN` and `APPLY`. Returns the index of the token that ended it.
fn read_from_clause(
    tokens: &[Token],
    mut j: usize,
    refs: &mut References,
    positions: &mut HashSet<usize>,
) -> Result<usize, SqlError> {
    let mut expect_table = true;
    loop {
        let tok = tokens.get(j);
        if matches!(tok, None | Some(Token::SemiColon | Token::RParen)) {
            if expect_table {
                return Err(unreadable(tokens, j));
            }
            return Ok(j);
        }

        if !expect_table {
            match tok {
                Some(Token::Comma) => expect_table = true,
                // Hints, ON conditions and column alias lists.
                Some(Token::LParen) => {
                    j = skip_group(tokens, j);
                    continue;
                }
                _ if is_any_keyword(tok, &["JOIN", "APPLY"]) => expect_table = true,
                _ if is_any_keyword(tok, FROM_TERMINATORS) => return Ok(j),
                _ => {}
            }
            j += 1;
            continue;
        }

        if matches!(tok, Some(Token::LParen)) {
            if is_keyword(tokens.get(j + 1), "SELECT") {
                j = skip_group(tokens, j);
            } else {
                let close = read_from_clause(tokens, j + 1, refs, positions)?;
                if !matches!(tokens.get(close), Some(Token::RParen)) {
                    return Err(unreadable(tokens, close));
                }
                j = close + 1;
            }
            expect_table = false;
            continue;
        }

        let is_name = match tok {
            Some(Token::Word(w)) => w.quote_style.is_some() || !is_any_keyword(tok, CLAUSE_WORDS),
            _ => false,
        };
        let Some((name, end)) = dotted_name(tokens, j).filter(|_| is_name) else {
            return Err(unreadable(tokens, j));
        };
        if matches!(tokens.get(end), Some(Token::LParen)) {
            return Err(SqlError::TableReference(format!(
                "table-valued function `{name}`"
            )));
        }
        positions.extend(j..end);
        refs.tables.insert(fold_case(&name));
        j = end;
        expect_table = false;
    }
}

fn unreadable(tokens: &[Token], j: usize) -> SqlError {
    match tokens.get(j) {
        Some(tok) => SqlError::TableReference(format!("unexpected `{tok}` in FROM clause")),
        None => SqlError::TableReference("FROM clause ends without a table".to_string()),
    }
}

/// `a.b.c` starting at `j`: (last part, index after the name).
fn dotted_name(tokens: &[Token], j: usize) -> Option<(String, usize)> {
    let mut last = ident(tokens.get(j))?;
    let mut end = j + 1;
    while matches!(tokens.get(end), Some(Token::Period)) {
        match ident(tokens.get(end + 1)) {
            Some(part) => {
                last = part;
                end += 2;
            }
            None => break,
        }
    }
    Some((last.to_string(), end))
}

fn collect_qualified_columns(
    tokens: &[Token],
    table_positions: &HashSet<usize>,
    refs: &mut References,
) {
    let mut i = 0;
    while i < tokens.len() {
        let after_period = i
            .checked_sub(1)
            .is_some_and(|p| matches!(tokens.get(p), Some(Token::Period)));
        let starts_chain = ident(tokens.get(i)).is_some()
            && !after_period
            && matches!(tokens.get(i + 1), Some(Token::Period));
        if !starts_chain || table_positions.contains(&i) {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        let mut last: Option<&Token> = None;
        while matches!(tokens.get(end), Some(Token::Period)) {
            match tokens.get(end + 1) {
                Some(t @ (Token::Word(_) | Token::Mul)) => {
                    last = Some(t);
                    end += 2;
                }
                _ => break,
            }
        }

        // `schema.fn(...)` is a function call.
        if !matches!(tokens.get(end), Some(Token::LParen)) {
            if let Some(Token::Word(w)) = last {
                refs.columns.insert(fold_case(&w.value));
            }
        }
        i = end.max(i + 1);
    }
}

fn collect_select_lists(tokens: &[Token], in_query: &[bool], refs: &mut References) {
    for i in 0..tokens.len() {
        if !in_query[i] || !is_keyword(tokens.get(i), "SELECT") {
            continue;
        }
        let start = skip_select_prefix(tokens, i + 1);
        let end = select_list_end(tokens, start);
        for item in split_items(&tokens[start..end]) {
            collect_item(item, refs);
        }
    }
}

/// Skip `ALL | DISTINCT` and `TOP n | TOP (n) [PERCENT] [WITH TIES]`.
fn skip_select_prefix(tokens: &[Token], mut j: usize) -> usize {
    if is_any_keyword(tokens.get(j), &["ALL", "DISTINCT"]) {
        j += 1;
    }
    if is_keyword(tokens.get(j), "TOP") {
        j += 1;
        match tokens.get(j) {
            Some(Token::LParen) => j = skip_group(tokens, j),
            Some(_) => j += 1,
            None => {}
        }
        if is_keyword(tokens.get(j), "PERCENT") {
            j += 1;
        }
        if is_keyword(tokens.get(j), "WITH") && is_keyword(tokens.get(j + 1), "TIES") {
            j += 2;
        }
    }
    j.min(tokens.len())
}

fn select_list_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (k, tok) in tokens.iter().enumerate().skip(start) {
        match tok {
            Token::LParen => depth += 1,
            Token::RParen => {
                if depth == 0 {
                    return k;
                }
                depth -= 1;
            }
            Token::SemiColon if depth == 0 => return k,
            _ if depth == 0 && is_any_keyword(Some(tok), LIST_TERMINATORS) => return k,
            _ => {}
        }
    }
    tokens.len()
}

/// Index just past the group opened at `open`.
fn skip_group(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (k, tok) in tokens.iter().enumerate().skip(open) {
        match tok {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return k + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

fn split_items(list: &[Token]) -> Vec<&[Token]> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (k, tok) in list.iter().enumerate() {
        match tok {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                items.push(&list[start..k]);
                start = k + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items
}

fn collect_item(item: &[Token], refs: &mut References) {
    if let [Token::Mul] = item {
        return;
    }

    let body = strip_alias(item);
    let mut k = 0;
    while k < body.len() {
        let tok = &body[k];
        // Subqueries are walked on their own by `collect_select_lists`.
        if matches!(tok, Token::LParen) && is_keyword(body.get(k + 1), "SELECT") {
            k = skip_group(body, k);
            continue;
        }
        if let Token::Word(w) = tok {
            let prev = k.checked_sub(1).and_then(|p| body.get(p));
            let next = body.get(k + 1);
            let qualified = matches!(prev, Some(Token::Period)) || matches!(next, Some(Token::Period));
            let function = matches!(next, Some(Token::LParen));
            let cast_type = is_keyword(prev, "AS");
            let syntax = w.quote_style.is_none() && is_any_keyword(Some(tok), EXPRESSION_WORDS);
            if !(qualified || function || cast_type || syntax) {
                refs.columns.insert(fold_case(&w.value));
            }
        }
        k += 1;
    }
}

/// Drop `AS alias`, an implicit trailing alias, or a leading `alias =`.
fn strip_alias(item: &[Token]) -> &[Token] {
    let n = item.len();
    if n >= 3 && matches!(item.get(1), Some(Token::Eq)) && ident(item.first()).is_some() {
        return &item[2..];
    }
    if n >= 2 && is_keyword(item.get(n - 2), "AS") && ident(item.get(n - 1)).is_some() {
        return &item[..n - 2];
    }
    if n >= 2 {
        if let Some(Token::Word(last)) = item.get(n - 1) {
            let last_is_name =
                last.quote_style.is_some() || !is_any_keyword(item.get(n - 1), EXPRESSION_WORDS);
            let prev = item.get(n - 2);
            let prev_ends_operand = match prev {
                Some(Token::Word(w)) => {
                    w.quote_style.is_some()
                        || !is_any_keyword(prev, EXPRESSION_WORDS)
                        || is_any_keyword(prev, &["END", "NULL"])
                }
                Some(
                    Token::RParen
                    | Token::Number(..)
                    | Token::SingleQuotedString(_)
                    | Token::NationalStringLiteral(_),
                ) => true,
                _ => false,
            };
            if last_is_name && prev_ends_operand {
                return &item[..n - 1];
            }
        }
    }
    item
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(refs: &References) -> Vec<&str> {
        refs.columns.iter().map(String::as_str).collect()
    }

    fn tables(refs: &References) -> Vec<&str> {
        refs.tables.iter().map(String::as_str).collect()
    }

    #[test]
    fn qualified_column_with_alias() {
        let refs = extract_references("SELECT TOP 5 o.total FROM orders o").unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
        assert_eq!(tables(&refs), vec!["orders"]);
    }

    #[test]
    fn unqualified_list_with_aliases() {
        let refs =
            extract_references("select top 3 Name AS n, total, [order date] od from Orders").unwrap();
        assert_eq!(cols(&refs), vec!["name", "order date", "total"]);
        assert_eq!(tables(&refs), vec!["orders"]);
    }

    #[test]
    fn star_is_not_a_column() {
        let refs = extract_references("SELECT TOP 10 * FROM orders").unwrap();
        assert!(refs.columns.is_empty());

        let refs = extract_references("SELECT TOP 10 o.* FROM orders o").unwrap();
        assert!(refs.columns.is_empty());
        assert_eq!(tables(&refs), vec!["orders"]);
    }

    #[test]
    fn joins_and_functions() {
        let refs = extract_references(
            "SELECT TOP 10 c.name, COUNT(o.id) AS order_count \
             FROM customers c JOIN orders o ON o.customer_id = c.id \
             GROUP BY c.name ORDER BY order_count DESC",
        )
        .unwrap();
        assert_eq!(cols(&refs), vec!["customer_id", "id", "name"]);
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn schema_qualified_table_is_not_a_column() {
        let refs = extract_references("SELECT TOP 1 total FROM dbo.orders").unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
        assert_eq!(tables(&refs), vec!["orders"]);
    }

    #[test]
    fn comma_separated_from_list() {
        let refs =
            extract_references("SELECT TOP 5 o.total, c.name FROM orders o, customers AS c").unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn comma_after_join_condition() {
        let refs = extract_references(
            "SELECT TOP 5 o.total FROM orders o JOIN orders o2 ON o2.id = o.id, customers c",
        )
        .unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn parenthesized_join_is_walked() {
        let refs = extract_references("SELECT TOP 5 name FROM (customers c)").unwrap();
        assert_eq!(tables(&refs), vec!["customers"]);

        let refs = extract_references(
            "SELECT TOP 5 c.name FROM (orders o JOIN (customers c) ON c.id = o.customer_id)",
        )
        .unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn table_hints_are_skipped() {
        let refs =
            extract_references("SELECT TOP 5 total FROM orders WITH (NOLOCK), customers WHERE id > 1")
                .unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn derived_table_contributes_its_inner_tables() {
        let refs = extract_references(
            "SELECT TOP 5 t.total FROM (SELECT total FROM orders) AS t CROSS JOIN customers",
        )
        .unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn temporal_clause_does_not_end_the_table_list() {
        let refs = extract_references(
            "SELECT TOP 5 total FROM orders FOR SYSTEM_TIME AS OF '2024-01-01', customers",
        )
        .unwrap();
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn unreadable_from_clause_fails() {
        for sql in [
            "SELECT TOP 5 * FROM OPENROWSET('x', 'y')",
            "SELECT TOP 5 * FROM orders CROSS APPLY dbo.split(note)",
            "SELECT TOP 5 * FROM orders,",
            "SELECT TOP 5 * FROM WHERE x = 1",
            "SELECT TOP 5 * FROM 'orders'",
        ] {
            assert!(
                matches!(extract_references(sql), Err(SqlError::TableReference(_))),
                "{sql}"
            );
        }
    }

    #[test]
    fn literals_and_comments_are_ignored() {
        let refs = extract_references(
            "SELECT TOP 5 total -- x.price\nFROM orders /* JOIN secrets */ WHERE note = 'p.cost FROM fees'",
        )
        .unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
        assert_eq!(tables(&refs), vec!["orders"]);
    }

    #[test]
    fn from_inside_function_is_not_a_table_clause() {
        let refs =
            extract_references("SELECT TOP 5 EXTRACT(YEAR FROM placed_at) AS y FROM orders").unwrap();
        assert_eq!(tables(&refs), vec!["orders"]);
        assert!(refs.columns.contains("placed_at"));
    }

    #[test]
    fn cast_type_and_case_keywords_are_skipped() {
        let refs = extract_references(
            "SELECT TOP 5 CAST(total AS DECIMAL(10, 2)) AS t, \
             CASE WHEN total > 10 THEN 'big' ELSE 'small' END size FROM orders",
        )
        .unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
    }

    #[test]
    fn subquery_tables_and_columns() {
        let refs = extract_references(
            "SELECT TOP 5 name FROM customers WHERE id IN (SELECT customer_id FROM orders)",
        )
        .unwrap();
        assert_eq!(cols(&refs), vec!["customer_id", "name"]);
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn scalar_subquery_in_select_list() {
        let refs =
            extract_references("SELECT TOP 1 (SELECT MAX(total) FROM orders) AS top_total FROM customers")
                .unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
        assert_eq!(tables(&refs), vec!["customers", "orders"]);
    }

    #[test]
    fn assignment_style_alias() {
        let refs = extract_references("SELECT TOP 5 spent = SUM(total) FROM orders").unwrap();
        assert_eq!(cols(&refs), vec!["total"]);
    }

    #[test]
    fn rejects_non_select_and_multiple_statements() {
        assert_eq!(
            extract_references("UPDATE orders SET total = 0"),
            Err(SqlError::NotSelect)
        );
        assert_eq!(
            extract_references("SELECT 1; DROP TABLE orders"),
            Err(SqlError::MultipleStatements)
        );
        assert!(extract_references("SELECT TOP 1 total FROM orders;").is_ok());
    }

    #[test]
    fn unterminated_string_fails_to_tokenize() {
        assert!(matches!(
            extract_references("SELECT TOP 1 total FROM orders WHERE note = 'oops"),
            Err(SqlError::Tokenize(_))
        ));
    }
}
