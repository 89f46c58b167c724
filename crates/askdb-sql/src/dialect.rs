use sqlparser::ast::{Expr, SetExpr, Statement, TopQuantity, Value};
use sqlparser::dialect::MsSqlDialect;
use sqlparser::parser::Parser;

/// Rewrite `SELECT TOP n ...` into `SELECT ... LIMIT n` for engines that do not
/// speak SQL Server's row-limiting syntax.
///
/// Returns `None` when there is nothing to rewrite or the rewrite would change
/// meaning: no `TOP`, `TOP ... PERCENT`, `WITH TIES`, an existing `LIMIT`, or a
/// query `sqlparser` cannot parse.
pub fn rewrite_top_as_limit(sql: &str) -> Option<String> {
    let dialect = MsSqlDialect {};
    let mut statements = Parser::parse_sql(&dialect, sql).ok()?;
    if statements.len() != 1 {
        return None;
    }
    let Statement::Query(query) = &mut statements[0] else {
        return None;
    };
    if query.limit.is_some() {
        return None;
    }
    let SetExpr::Select(select) = query.body.as_mut() else {
        return None;
    };
    let top = select.top.take()?;
    if top.percent || top.with_ties {
        return None;
    }
    query.limit = Some(match top.quantity? {
        TopQuantity::Expr(expr) => expr,
        TopQuantity::Constant(n) => Expr::Value(Value::Number(n.to_string(), false)),
    });
    Some(statements[0].to_string())
}
