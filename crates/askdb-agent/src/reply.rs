//! Strict decoding of model replies.
//!
//! A reply must be exactly one JSON object carrying the expected key. Code
//! fences, prose around the object, or a wrongly typed value are all parse
//! failures; there is no lenient recovery.

use serde::de::DeserializeOwned;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("reply lacks the `{0}` key")]
    MissingKey(&'static str),
    #[error("`{key}` has the wrong shape: {reason}")]
    Shape { key: &'static str, reason: String },
}

pub(crate) fn parse_field<T: DeserializeOwned>(reply: &str, key: &'static str) -> Result<T, ReplyError> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(reply.trim())? else {
        return Err(ReplyError::NotAnObject);
    };
    let field = object.remove(key).ok_or(ReplyError::MissingKey(key))?;
    serde_json::from_value(field).map_err(|e| ReplyError::Shape {
        key,
        reason: e.to_string(),
    })
}
