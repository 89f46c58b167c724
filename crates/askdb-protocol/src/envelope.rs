//! Wire envelopes for the HTTP and stdio transports.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::{ToolCall, ToolOutput};
use crate::ProtocolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl TextContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Successful call response: the tagged result serialized as one text block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResponse {
    pub content: Vec<TextContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl CallToolResponse {
    pub fn from_output(output: &ToolOutput) -> Result<Self, ProtocolError> {
        Ok(Self {
            content: vec![TextContent::text(serde_json::to_string(output)?)],
            is_error: false,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DisallowedStatement,
    InvalidArguments,
    UnknownTool,
    Execution,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::DisallowedStatement => "disallowed statement",
            FailureKind::InvalidArguments => "invalid arguments",
            FailureKind::UnknownTool => "unknown tool",
            FailureKind::Execution => "execution error",
            FailureKind::Other => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// HTTP error body (`{"error": ..., "kind": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default)]
    pub kind: FailureKind,
}

impl From<ToolFailure> for ErrorBody {
    fn from(failure: ToolFailure) -> Self {
        Self {
            error: failure.message,
            kind: failure.kind,
        }
    }
}

/// One newline-delimited request on the stdio transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioRequest {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Option<ToolCall>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioResponse {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl StdioResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: ToolFailure) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}
