//! Static checks for model-generated SQL.
//!
//! The language model is untrusted: it proposes a query, and this crate decides
//! whether that query may run. Nothing here executes SQL.
//!
//! - [`is_select_statement`] is the execution gate every `run_sql` call passes
//!   through before a connection is opened.
//! - [`extract_references`] pulls table and column identifiers out of a query
//!   using the `sqlparser` tokenizer (lexical, not a full parse).
//! - [`validate_query`] checks those identifiers against the schema subset the
//!   table matcher settled on.
//! - [`rewrite_top_as_limit`] bridges SQL Server `TOP n` to engines that only
//!   understand `LIMIT n`.

mod dialect;
mod extract;
mod lexer;
mod validate;

pub use dialect::rewrite_top_as_limit;
pub use extract::{extract_references, References};
pub use validate::{validate_query, SchemaScope, ValidationOutcome};

/// The one case-folding rule for table and column names, shared by table
/// matching and query validation.
pub fn fold_case(name: &str) -> String {
    name.to_lowercase()
}

pub fn same_identifier(a: &str, b: &str) -> bool {
    fold_case(a) == fold_case(b)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SqlError {
    #[error("failed to tokenize query: {0}")]
    Tokenize(String),
    #[error("query does not begin with SELECT")]
    NotSelect,
    #[error("only a single statement is allowed")]
    MultipleStatements,
    #[error("unsupported table reference: {0}")]
    TableReference(String),
}

/// True when the trimmed query starts with `select` (ASCII case-insensitive).
pub fn is_select_statement(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("select"))
}
