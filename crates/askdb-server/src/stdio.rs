use askdb_protocol::{
    tool_specs, CallToolResponse, FailureKind, StdioRequest, StdioResponse, ToolFailure,
};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::tools::ToolServer;
use crate::ServeError;

const METHOD_CALL: &str = "tools/call";
const METHOD_LIST: &str = "tools/list";

/// Serve newline-delimited JSON requests until `reader` reaches EOF.
///
/// Every non-blank input line gets exactly one response line, in order.
pub async fn serve_stdio<R, W>(reader: R, mut writer: W, server: ToolServer) -> Result<(), ServeError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("tool server reading requests from stdio");
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.map_err(ServeError::Io)? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&server, &line).await;
        let mut encoded = serde_json::to_string(&response).map_err(ServeError::Encode)?;
        encoded.push('\n');
        writer
            .write_all(encoded.as_bytes())
            .await
            .map_err(ServeError::Io)?;
        writer.flush().await.map_err(ServeError::Io)?;
    }
    info!("stdio closed");
    Ok(())
}

async fn handle_line(server: &ToolServer, line: &str) -> StdioResponse {
    let request: StdioRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            return StdioResponse::err(
                Value::Null,
                failure(FailureKind::InvalidArguments, format!("invalid request: {e}")),
            )
        }
    };
    debug!(method = %request.method, id = %request.id, "stdio request");

    match request.method.as_str() {
        METHOD_LIST => match serde_json::to_value(tool_specs()) {
            Ok(specs) => StdioResponse::ok(request.id, specs),
            Err(e) => StdioResponse::err(request.id, failure(FailureKind::Other, e.to_string())),
        },
        METHOD_CALL => {
            let Some(call) = request.params else {
                return StdioResponse::err(
                    request.id,
                    failure(FailureKind::InvalidArguments, "missing `params`".to_string()),
                );
            };
            match server.dispatch(&call).await {
                Ok(output) => {
                    let envelope = CallToolResponse::from_output(&output)
                        .and_then(|r| serde_json::to_value(r).map_err(Into::into));
                    match envelope {
                        Ok(value) => StdioResponse::ok(request.id, value),
                        Err(e) => {
                            StdioResponse::err(request.id, failure(FailureKind::Other, e.to_string()))
                        }
                    }
                }
                Err(e) => StdioResponse::err(request.id, e.to_failure()),
            }
        }
        other => StdioResponse::err(
            request.id,
            failure(FailureKind::Other, format!("unknown method `{other}`")),
        ),
    }
}

fn failure(kind: FailureKind, message: String) -> ToolFailure {
    ToolFailure { kind, message }
}
