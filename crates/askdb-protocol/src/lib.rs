//! Tool protocol shared by the askdb tool server and its clients.
//!
//! The tool server exposes four read-only operations (`list_tables`,
//! `list_columns`, `run_sql`, `table_not_found`). A successful call produces a
//! tagged [`ToolOutput`]:
//!
//! ```text
//! {"tool_result": "list_tables", "output": [{"schema": "main", "table": "orders"}]}
//! ```
//!
//! On the wire that tagged value is usually serialized to text and wrapped in a
//! content envelope ([`CallToolResponse`]). Clients do not assume which
//! encoding a given server build uses: [`ToolPayload`] names every encoding we
//! know about and keeps anything else as an explicit pass-through.

pub mod envelope;
pub mod payload;
pub mod tools;
pub mod transport;

pub use envelope::{
    CallToolResponse, ErrorBody, FailureKind, StdioRequest, StdioResponse, TextContent,
    ToolFailure,
};
pub use payload::ToolPayload;
pub use tools::{
    table_not_found_message, tool_specs, ColumnInfo, Row, TableRef, ToolCall, ToolName,
    ToolOutput, ToolSpec,
};
pub use transport::{ToolTransport, TransportError};

/// Errors raised while decoding tool results.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("tool result is not a tagged result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("expected a `{expected}` result, got `{found}`")]
    UnexpectedResult { expected: ToolName, found: ToolName },
}
