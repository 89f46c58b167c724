use std::sync::Arc;

use askdb_protocol::{
    table_not_found_message, FailureKind, ToolCall, ToolFailure, ToolName, ToolOutput,
};
use askdb_sql::is_select_statement;
use tracing::{debug, error, warn};

use crate::database::{Connection, Connector, DatabaseError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Only SELECT queries are allowed.")]
    DisallowedStatement,
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: ToolName, reason: String },
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("{operation} failed: {source}")]
    Execution {
        operation: ToolName,
        #[source]
        source: DatabaseError,
    },
}

impl ToolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ToolError::DisallowedStatement => FailureKind::DisallowedStatement,
            ToolError::InvalidArguments { .. } => FailureKind::InvalidArguments,
            ToolError::UnknownTool(_) => FailureKind::UnknownTool,
            ToolError::Execution { .. } => FailureKind::Execution,
        }
    }

    pub fn to_failure(&self) -> ToolFailure {
        ToolFailure {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// The four read-only operations. The only code path that touches the database.
///
/// Cheap to clone; every call opens its own connection on the blocking pool
/// and drops it before returning, so concurrent calls never share one.
#[derive(Clone)]
pub struct ToolServer {
    connector: Arc<dyn Connector>,
}

impl ToolServer {
    pub fn new(connector: impl Connector) -> Self {
        Self {
            connector: Arc::new(connector),
        }
    }

    /// Open and drop one connection, surfacing configuration problems at startup.
    pub async fn probe(&self) -> Result<(), ToolError> {
        self.with_connection(ToolName::ListTables, |_| Ok(())).await
    }

    pub async fn list_tables(&self) -> Result<ToolOutput, ToolError> {
        let tables = self
            .with_connection(ToolName::ListTables, |conn| conn.tables())
            .await?;
        debug!(count = tables.len(), "list_tables");
        Ok(ToolOutput::ListTables(tables))
    }

    pub async fn list_columns(&self, table: &str) -> Result<ToolOutput, ToolError> {
        let owned = table.to_string();
        let columns = self
            .with_connection(ToolName::ListColumns, move |conn| conn.columns(&owned))
            .await?;
        debug!(table, count = columns.len(), "list_columns");
        Ok(ToolOutput::ListColumns(columns))
    }

    /// Rejects anything that does not start with `select` before a connection
    /// is opened.
    pub async fn run_sql(&self, query: &str) -> Result<ToolOutput, ToolError> {
        if !is_select_statement(query) {
            warn!(query, "rejected non-SELECT statement");
            return Err(ToolError::DisallowedStatement);
        }
        let owned = query.to_string();
        let rows = self
            .with_connection(ToolName::RunSql, move |conn| conn.query(&owned))
            .await?;
        debug!(query, rows = rows.len(), "run_sql");
        Ok(ToolOutput::RunSql(rows))
    }

    pub fn table_not_found(&self, table: &str) -> ToolOutput {
        ToolOutput::TableNotFound(table_not_found_message(table))
    }

    /// Route a wire-level call to its operation.
    pub async fn dispatch(&self, call: &ToolCall) -> Result<ToolOutput, ToolError> {
        let Some(tool) = call.tool() else {
            warn!(tool = %call.name, "unknown tool");
            return Err(ToolError::UnknownTool(call.name.clone()));
        };
        match tool {
            ToolName::ListTables => self.list_tables().await,
            ToolName::ListColumns => self.list_columns(required_str(call, tool, "table")?).await,
            ToolName::RunSql => self.run_sql(required_str(call, tool, "query")?).await,
            ToolName::TableNotFound => Ok(self.table_not_found(required_str(call, tool, "table")?)),
        }
    }

    async fn with_connection<T, F>(&self, operation: ToolName, f: F) -> Result<T, ToolError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let connector = Arc::clone(&self.connector);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = connector.connect()?;
            f(conn.as_mut())
        })
        .await
        .map_err(|e| DatabaseError::Worker(e.to_string()))
        .and_then(|r| r);

        result.map_err(|source| {
            error!(tool = %operation, error = %source, "tool call failed");
            ToolError::Execution { operation, source }
        })
    }
}

fn required_str<'a>(call: &'a ToolCall, tool: ToolName, key: &str) -> Result<&'a str, ToolError> {
    call.str_arg(key).ok_or_else(|| ToolError::InvalidArguments {
        tool,
        reason: format!("missing string argument `{key}`"),
    })
}
