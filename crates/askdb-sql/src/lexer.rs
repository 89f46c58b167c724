use sqlparser::dialect::MsSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::SqlError;

/// Tokens with whitespace and comments removed.
pub(crate) fn significant_tokens(sql: &str) -> Result<Vec<Token>, SqlError> {
    let dialect = MsSqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize()
        .map_err(|e| SqlError::Tokenize(e.to_string()))?;
    Ok(tokens
        .into_iter()
        .filter(|t| !matches!(t, Token::Whitespace(_) | Token::EOF))
        .collect())
}

/// Unquoted word equal to `kw` (ASCII case-insensitive).
pub(crate) fn is_keyword(token: Option<&Token>, kw: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(kw))
}

pub(crate) fn is_any_keyword(token: Option<&Token>, kws: &[&str]) -> bool {
    kws.iter().any(|kw| is_keyword(token, kw))
}

/// Identifier text of a word token; quoted identifiers come back unquoted.
pub(crate) fn ident(token: Option<&Token>) -> Option<&str> {
    match token {
        Some(Token::Word(w)) => Some(w.value.as_str()),
        _ => None,
    }
}
