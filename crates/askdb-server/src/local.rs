use askdb_protocol::{
    tool_specs, CallToolResponse, ToolCall, ToolSpec, ToolTransport, TransportError,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::tools::ToolServer;

/// In-process transport: calls the server directly and wraps results in the
/// same envelope the HTTP transport returns.
#[derive(Clone)]
pub struct LocalTransport {
    server: ToolServer,
}

impl LocalTransport {
    pub fn new(server: ToolServer) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ToolTransport for LocalTransport {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, TransportError> {
        Ok(tool_specs())
    }

    async fn call(&self, call: &ToolCall) -> Result<Value, TransportError> {
        let output = self
            .server
            .dispatch(call)
            .await
            .map_err(|e| TransportError::Tool {
                tool: call.name.clone(),
                kind: e.kind(),
                message: e.to_string(),
            })?;
        let envelope = CallToolResponse::from_output(&output)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        serde_json::to_value(envelope).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}
