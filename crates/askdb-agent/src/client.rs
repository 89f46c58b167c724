//! Scoped access to a tool server.

use std::time::Duration;

use askdb_protocol::{
    ColumnInfo, ErrorBody, FailureKind, ProtocolError, Row, TableRef, ToolCall, ToolName,
    ToolOutput, ToolPayload, ToolSpec, ToolTransport, TransportError,
};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("could not decode tool result: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("tool server does not offer `{0}`")]
    MissingTool(ToolName),
}

/// A live session with a tool server.
///
/// [`ToolClient::connect`] performs the handshake; the transport is released
/// when the client is closed or dropped.
pub struct ToolClient {
    transport: Box<dyn ToolTransport>,
}

impl ToolClient {
    /// Connect and check that the server offers every operation.
    pub async fn connect(transport: impl ToolTransport + 'static) -> Result<Self, ClientError> {
        let specs = transport.list_tools().await?;
        if let Some(missing) = ToolName::ALL
            .into_iter()
            .find(|tool| !specs.iter().any(|s| s.name == tool.as_str()))
        {
            return Err(ClientError::MissingTool(missing));
        }
        info!(tools = specs.len(), "connected to tool server");
        Ok(Self {
            transport: Box::new(transport),
        })
    }

    /// Send one call and return the raw result value.
    pub async fn call(&self, call: &ToolCall) -> Result<Value, ClientError> {
        debug!(tool = %call.name, "calling tool");
        Ok(self.transport.call(call).await?)
    }

    /// Send one call and normalize whatever envelope came back.
    pub async fn call_unwrapped(&self, call: &ToolCall) -> Result<ToolPayload, ClientError> {
        Ok(ToolPayload::from_value(self.call(call).await?))
    }

    async fn call_decoded(&self, call: &ToolCall) -> Result<ToolOutput, ClientError> {
        Ok(self.call_unwrapped(call).await?.decode()?)
    }

    pub async fn list_tables(&self) -> Result<Vec<TableRef>, ClientError> {
        Ok(self.call_decoded(&ToolCall::list_tables()).await?.into_tables()?)
    }

    pub async fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, ClientError> {
        Ok(self
            .call_decoded(&ToolCall::list_columns(table))
            .await?
            .into_columns()?)
    }

    pub async fn run_sql(&self, query: &str) -> Result<Vec<Row>, ClientError> {
        Ok(self.call_decoded(&ToolCall::run_sql(query)).await?.into_rows()?)
    }

    pub async fn table_not_found(&self, table: &str) -> Result<String, ClientError> {
        Ok(self
            .call_decoded(&ToolCall::table_not_found(table))
            .await?
            .into_message()?)
    }

    pub fn close(self) {
        debug!("tool client closed");
    }
}

/// Tool server reached over HTTP (`GET /tools`, `POST /tools/call`).
pub struct HttpTransport {
    client: Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let mut base = Url::parse(base_url)
            .map_err(|e| TransportError::Unavailable(format!("invalid server URL {base_url:?}: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(TransportError::Unavailable(format!(
                "unsupported server URL scheme `{}`",
                base.scheme()
            )));
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ToolTransport for HttpTransport {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, TransportError> {
        let url = self.endpoint("tools")?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(TransportError::Unavailable(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))
    }

    async fn call(&self, call: &ToolCall) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.endpoint("tools/call")?)
            .json(call)
            .send()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(format!("{status}: {e}")))?;

        if !status.is_success() {
            let error: ErrorBody = serde_json::from_value(body.clone())
                .map_err(|_| TransportError::Malformed(format!("{status}: {body}")))?;
            return Err(TransportError::Tool {
                tool: call.name.clone(),
                kind: error.kind,
                message: error.error,
            });
        }

        if body.get("isError").and_then(Value::as_bool) == Some(true) {
            let message = ToolPayload::from_value(body)
                .into_text()
                .unwrap_or_else(|raw| raw.to_string());
            return Err(TransportError::Tool {
                tool: call.name.clone(),
                kind: FailureKind::Other,
                message,
            });
        }

        Ok(body)
    }
}
