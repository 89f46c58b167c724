use std::future::Future;
use std::net::SocketAddr;

use askdb_protocol::{tool_specs, CallToolResponse, ErrorBody, FailureKind, ToolCall};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::tools::ToolServer;
use crate::ServeError;

/// Largest `/tools/call` body accepted; bigger requests get 413.
pub const MAX_CALL_BODY_BYTES: usize = 1024 * 1024;

pub async fn bind(addr: &str) -> Result<TcpListener, ServeError> {
    TcpListener::bind(addr).await.map_err(|source| ServeError::Bind {
        addr: addr.to_string(),
        source,
    })
}

/// Serve the tool server over HTTP/1 until `shutdown` resolves.
///
/// Routes:
/// - `GET /healthz`
/// - `GET /tools` tool specs
/// - `POST /tools/call` with a [`ToolCall`] body
pub async fn serve_http(
    listener: TcpListener,
    server: ToolServer,
    shutdown: impl Future<Output = ()>,
) -> Result<(), ServeError> {
    let bound: SocketAddr = listener.local_addr().map_err(ServeError::Io)?;
    info!("tool server listening on http://{bound}");

    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                info!("tool server shutting down");
                return Ok(());
            }
            accepted = listener.accept() => accepted.map_err(ServeError::Io)?,
        };
        let io = TokioIo::new(stream);
        let server = server.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(req, server.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                warn!(%peer, error = %e, "connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    server: ToolServer,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match (method, path.as_str()) {
        (Method::GET, "/healthz") => text_response(StatusCode::OK, "ok\n"),
        (Method::GET, "/tools") => json_response(StatusCode::OK, &tool_specs()),
        (Method::POST, "/tools/call") => {
            match Limited::new(req.into_body(), MAX_CALL_BODY_BYTES).collect().await {
                Ok(collected) => handle_call(&server, &collected.to_bytes()).await,
                Err(e) if e.is::<LengthLimitError>() => {
                    warn!(limit = MAX_CALL_BODY_BYTES, "tool call body too large");
                    json_error(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        &format!("tool call body exceeds {MAX_CALL_BODY_BYTES} bytes"),
                        FailureKind::InvalidArguments,
                    )
                }
                Err(e) => json_error(
                    StatusCode::BAD_REQUEST,
                    &format!("failed to read request body: {e}"),
                    FailureKind::Other,
                ),
            }
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found", FailureKind::Other),
    };

    Ok(resp)
}

async fn handle_call(server: &ToolServer, body: &[u8]) -> Response<Full<Bytes>> {
    let call: ToolCall = match serde_json::from_slice(body) {
        Ok(call) => call,
        Err(e) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                &format!("failed to parse tool call JSON: {e}"),
                FailureKind::InvalidArguments,
            )
        }
    };
    debug!(tool = %call.name, "tool call");

    match server.dispatch(&call).await {
        Ok(output) => match CallToolResponse::from_output(&output) {
            Ok(envelope) => json_response(StatusCode::OK, &envelope),
            Err(e) => json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &e.to_string(),
                FailureKind::Other,
            ),
        },
        Err(e) => {
            let status = match e.kind() {
                FailureKind::Execution | FailureKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            };
            json_error(status, &e.to_string(), e.kind())
        }
    }
}

fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"internal error"))))
}

fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(value).unwrap_or_else(|_| b"{\"error\":\"serialize\"}".to_vec());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal\"}"))))
}

fn json_error(status: StatusCode, msg: &str, kind: FailureKind) -> Response<Full<Bytes>> {
    let body = ErrorBody {
        error: msg.to_string(),
        kind,
    };
    json_response(status, &body)
}
