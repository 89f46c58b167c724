//! Answer natural-language questions from a SQL tool server.
//!
//! A [`Pipeline`] holds one [`ToolClient`] session, one [`ChatModel`] and the
//! session's [`Catalog`]. For each question it asks the model which tables
//! are relevant, checks the answer against the catalog, asks the model for a
//! single `SELECT`, checks that query with [`askdb_sql::validate_query`] and
//! only then runs it through the tool server.

pub mod catalog;
pub mod client;
pub mod config;
pub mod llm;
pub mod matcher;
pub mod pipeline;
pub mod planner;
mod reply;

pub use catalog::{Catalog, CatalogEntry};
pub use client::{ClientError, HttpTransport, ToolClient};
pub use config::{AgentConfig, ConfigError, LlmConfig, Provider};
pub use llm::{ChatModel, CompletionRequest, CompletionResponse, Conversation, LlmError, UnifiedClient};
pub use pipeline::{Outcome, Pipeline, QuestionReport, Stage};
pub use reply::ReplyError;

/// Failure of a model-driven stage.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("model call failed: {0}")]
    Model(#[from] LlmError),
    #[error("could not parse model reply: {0}")]
    Parse(#[from] ReplyError),
}
