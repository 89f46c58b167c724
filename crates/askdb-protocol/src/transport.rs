//! The seam between tool clients and however the server is reached.

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::FailureKind;
use crate::tools::{ToolCall, ToolSpec};

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The server ran the call and reported a failure.
    #[error("tool `{tool}` failed ({kind}): {message}")]
    Tool {
        tool: String,
        kind: FailureKind,
        message: String,
    },
    #[error("tool server unavailable: {0}")]
    Unavailable(String),
    #[error("malformed tool server response: {0}")]
    Malformed(String),
}

/// Request/response access to a tool server.
///
/// `call` returns the raw response value; callers normalize it with
/// [`crate::ToolPayload`].
#[async_trait]
pub trait ToolTransport: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, TransportError>;

    async fn call(&self, call: &ToolCall) -> Result<Value, TransportError>;
}
