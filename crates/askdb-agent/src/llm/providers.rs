//! Concrete chat-completion clients.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value};
use tracing::debug;

use super::{
    ChatModel, CompletionRequest, CompletionResponse, FinishReason, LlmError, Message, Role, Usage,
};
use crate::config::{LlmConfig, Provider};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_DEFAULT_MAX_TOKENS: usize = 4096;

fn http_client(config: &LlmConfig) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| LlmError::Setup(e.to_string()))
}

async fn send(builder: RequestBuilder) -> Result<Value, LlmError> {
    let response: Response = builder
        .send()
        .await
        .map_err(|e| LlmError::Network(e.to_string()))?;

    if response.status() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LlmError::RateLimited {
            retry_after_ms: retry_after * 1000,
        });
    }

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::Api(format!("{status}: {error_text}")));
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(e.to_string()))
}

// ============================================================================
// OpenAI / Azure OpenAI
// ============================================================================

/// OpenAI chat completions; also serves Azure OpenAI deployments, which speak
/// the same body format behind a different URL and auth header.
pub struct OpenAIClient {
    client: Client,
    config: LlmConfig,
}

impl OpenAIClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.provider {
            Provider::Azure => format!(
                "{base}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.model,
                self.config.api_version.as_deref().unwrap_or_default()
            ),
            _ => format!("{base}/chat/completions"),
        }
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({ "messages": messages });
        if self.config.provider != Provider::Azure {
            body["model"] = json!(self.config.model);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if request.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl ChatModel for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = self.endpoint();
        debug!(%url, messages = request.messages.len(), "chat completion");

        let builder = self.client.post(&url).json(&self.body(request));
        let builder = match self.config.provider {
            Provider::Azure => builder.header("api-key", &self.config.api_key),
            _ => builder.bearer_auth(&self.config.api_key),
        };
        let data = send(builder).await?;

        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))?
            .to_string();

        let finish_reason = match data["choices"][0]["finish_reason"].as_str() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
            },
            model: data["model"]
                .as_str()
                .unwrap_or(self.config.model.as_str())
                .to_string(),
        })
    }
}

// ============================================================================
// Anthropic
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    config: LlmConfig,
}

impl AnthropicClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = http_client(&config)?;
        Ok(Self { client, config })
    }

    fn body(&self, request: &CompletionRequest) -> Value {
        // System turns travel in the top-level `system` field.
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m: &Message| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(ANTHROPIC_DEFAULT_MAX_TOKENS),
        });
        if !system.is_empty() {
            body["system"] = json!(system.join("\n\n"));
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        body
    }
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/messages", self.config.base_url.trim_end_matches('/'));
        debug!(%url, messages = request.messages.len(), "messages completion");

        let builder = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(request));
        let data = send(builder).await?;

        let content = data["content"][0]["text"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing content[0].text".to_string()))?
            .to_string();

        let finish_reason = match data["stop_reason"].as_str() {
            Some("max_tokens") => FinishReason::Length,
            _ => FinishReason::Stop,
        };

        Ok(CompletionResponse {
            content,
            finish_reason,
            usage: Usage {
                prompt_tokens: data["usage"]["input_tokens"].as_u64().unwrap_or(0) as usize,
                completion_tokens: data["usage"]["output_tokens"].as_u64().unwrap_or(0) as usize,
            },
            model: self.config.model.clone(),
        })
    }
}

// ============================================================================
// Unified client
// ============================================================================

pub enum UnifiedClient {
    OpenAI(OpenAIClient),
    Anthropic(AnthropicClient),
}

impl UnifiedClient {
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        match config.provider {
            Provider::OpenAI | Provider::Azure => Ok(Self::OpenAI(OpenAIClient::new(config)?)),
            Provider::Anthropic => Ok(Self::Anthropic(AnthropicClient::new(config)?)),
        }
    }
}

#[async_trait]
impl ChatModel for UnifiedClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        match self {
            Self::OpenAI(c) => c.complete(request).await,
            Self::Anthropic(c) => c.complete(request).await,
        }
    }
}
