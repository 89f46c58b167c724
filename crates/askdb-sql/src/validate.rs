use std::collections::BTreeSet;
use std::fmt;

use crate::extract::{extract_references, References};
use crate::{fold_case, is_select_statement, SqlError};

/// The tables and columns a query is allowed to mention: the union of the
/// columns of every matched table. Comparisons are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaScope {
    tables: BTreeSet<String>,
    columns: BTreeSet<String>,
}

impl SchemaScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table<I, S>(&mut self, table: &str, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tables.insert(fold_case(table));
        self.columns
            .extend(columns.into_iter().map(|c| fold_case(c.as_ref())));
    }

    pub fn with_table<I, S>(mut self, table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.add_table(table, columns);
        self
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains(&fold_case(table))
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.columns.contains(&fold_case(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every referenced identifier is in scope.
    Accepted(References),
    /// Column identifiers outside the matched schemas, lowercased and sorted.
    UnknownColumns(Vec<String>),
    /// Table identifiers outside the matched set, lowercased and sorted.
    UnknownTables(Vec<String>),
    /// Not a single SELECT statement, or the tokenizer rejected it.
    Unparseable(String),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Accepted(_) => write!(f, "query accepted"),
            ValidationOutcome::UnknownColumns(cols) => {
                write!(f, "query references unknown columns: {}", cols.join(", "))
            }
            ValidationOutcome::UnknownTables(tables) => {
                write!(f, "query references unknown tables: {}", tables.join(", "))
            }
            ValidationOutcome::Unparseable(reason) => write!(f, "query rejected: {reason}"),
        }
    }
}

/// Check a generated query against the matched schemas.
///
/// Columns are checked before tables, so a query that is wrong on both counts
/// reports its columns.
pub fn validate_query(sql: &str, scope: &SchemaScope) -> ValidationOutcome {
    if !is_select_statement(sql) {
        return ValidationOutcome::Unparseable(SqlError::NotSelect.to_string());
    }
    let refs = match extract_references(sql) {
        Ok(refs) => refs,
        Err(e) => return ValidationOutcome::Unparseable(e.to_string()),
    };

    let unknown_columns: Vec<String> = refs
        .columns
        .iter()
        .filter(|c| !scope.contains_column(c))
        .cloned()
        .collect();
    if !unknown_columns.is_empty() {
        return ValidationOutcome::UnknownColumns(unknown_columns);
    }

    let unknown_tables: Vec<String> = refs
        .tables
        .iter()
        .filter(|t| !scope.contains_table(t))
        .cloned()
        .collect();
    if !unknown_tables.is_empty() {
        return ValidationOutcome::UnknownTables(unknown_tables);
    }

    ValidationOutcome::Accepted(refs)
}
