//! Database access behind the tool server.
//!
//! A [`Connector`] hands out one [`Connection`] per tool call. Connections are
//! blocking and never shared: the server opens one on the blocking pool, uses
//! it for a single operation and drops it before the call returns.

use askdb_protocol::{ColumnInfo, Row, TableRef};

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to open database {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("database worker failed: {0}")]
    Worker(String),
    #[error("{0}")]
    Other(String),
}

pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> Result<Box<dyn Connection>, DatabaseError>;
}

pub trait Connection {
    /// All base tables, ordered by name.
    fn tables(&mut self) -> Result<Vec<TableRef>, DatabaseError>;

    /// Columns of `table` in declaration order; empty when the table does not exist.
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, DatabaseError>;

    /// Run one query and return its rows in result-set order, each row keyed by
    /// column name in select-list order.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>, DatabaseError>;
}
