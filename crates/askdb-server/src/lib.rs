//! The askdb tool server.
//!
//! Exposes four read-only operations (`list_tables`, `list_columns`,
//! `run_sql`, `table_not_found`) and owns the only code path that touches the
//! database. Each call gets its own connection, opened and dropped within the
//! call.
//!
//! Transports:
//! - [`serve_http`]: hyper HTTP/1 (`GET /tools`, `POST /tools/call`)
//! - [`serve_stdio`]: newline-delimited JSON over any async reader/writer
//! - [`LocalTransport`]: in-process, for embedding the server in a client

pub mod config;
pub mod database;
mod http;
mod local;
mod sqlite;
mod stdio;
mod tools;

pub use config::{ConfigError, ServerConfig, Transport};
pub use database::{Connection, Connector, DatabaseError};
pub use http::{bind, serve_http, MAX_CALL_BODY_BYTES};
pub use local::LocalTransport;
pub use sqlite::SqliteConnector;
pub use stdio::serve_stdio;
pub use tools::{ToolError, ToolServer};

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}
