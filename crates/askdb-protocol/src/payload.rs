//! Normalizing raw tool results.
//!
//! Different server builds (and different client libraries) hand back "the same
//! string payload" in different shapes: a content envelope, a bare text object,
//! a list of text blocks, or the tagged result itself. [`ToolPayload`] names
//! each known shape; anything unrecognized is kept as [`ToolPayload::Passthrough`]
//! so callers can still try to use it.

use serde_json::Value;

use crate::tools::ToolOutput;
use crate::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    /// `{"content": [{"text": "..."}, ...]}`: text of the first block.
    Envelope(String),
    /// `{"text": "..."}`.
    Text(String),
    /// `[{"text": "..."}, ...]`: text of the first block.
    Blocks(String),
    /// Any other shape, unchanged.
    Passthrough(Value),
}

impl ToolPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => match map.get("content").map(first_block_text) {
                Some(Some(text)) => ToolPayload::Envelope(text),
                // A content key whose first block carries no text is left alone,
                // even if the object also has a `text` key.
                Some(None) => ToolPayload::Passthrough(Value::Object(map)),
                None => match map.get("text").and_then(Value::as_str).map(str::to_owned) {
                    Some(text) => ToolPayload::Text(text),
                    None => ToolPayload::Passthrough(Value::Object(map)),
                },
            },
            Value::Array(items) => match items.first().and_then(block_text) {
                Some(text) => ToolPayload::Blocks(text),
                None => ToolPayload::Passthrough(Value::Array(items)),
            },
            other => ToolPayload::Passthrough(other),
        }
    }

    /// The unwrapped text, or the pass-through value.
    pub fn into_text(self) -> Result<String, Value> {
        match self {
            ToolPayload::Envelope(text) | ToolPayload::Text(text) | ToolPayload::Blocks(text) => {
                Ok(text)
            }
            ToolPayload::Passthrough(value) => Err(value),
        }
    }

    /// The unwrapped payload as a JSON value (text stays a JSON string).
    pub fn into_value(self) -> Value {
        match self.into_text() {
            Ok(text) => Value::String(text),
            Err(value) => value,
        }
    }

    /// Decode the tagged result carried by this payload.
    ///
    /// Text payloads are parsed as JSON; a pass-through value is decoded as-is,
    /// which covers servers that return the tagged result unwrapped.
    pub fn decode(self) -> Result<ToolOutput, ProtocolError> {
        match self.into_text() {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(value) => Ok(serde_json::from_value(value)?),
        }
    }
}

fn first_block_text(content: &Value) -> Option<String> {
    content.as_array()?.first().and_then(block_text)
}

fn block_text(block: &Value) -> Option<String> {
    block.get("text")?.as_str().map(str::to_owned)
}
