//! Chat-model access.
//!
//! Stages talk to a [`ChatModel`]; concrete clients for OpenAI, Azure OpenAI
//! and Anthropic live in [`providers`]. A stage builds its own
//! [`Conversation`] from its inputs and never sees another stage's turns.

mod providers;

use async_trait::async_trait;

pub use providers::{AnthropicClient, OpenAIClient, UnifiedClient};

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Append-only turn history for one stage of one question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.push(Role::System, content);
        self
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.push(Role::User, content);
        self
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message {
            role,
            content: content.into(),
        });
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Deterministic JSON-mode request over this history.
    pub fn json_request(&self) -> CompletionRequest {
        CompletionRequest {
            messages: self.messages.clone(),
            max_tokens: None,
            temperature: Some(0.0),
            json_mode: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    /// Ask for a JSON object reply where the provider supports it.
    pub json_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("client setup failed: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_is_ordered_and_deterministic() {
        let conversation = Conversation::new().system("rules").user("question");
        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User]);

        let request = conversation.json_request();
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.json_mode);
        assert_eq!(request.messages, conversation.messages());
    }
}
