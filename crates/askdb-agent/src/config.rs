//! Agent configuration, built once at startup from an environment lookup.

use std::str::FromStr;
use std::time::Duration;

pub const SERVER_URL_ENV: &str = "ASKDB_SERVER_URL";
pub const LLM_PROVIDER_ENV: &str = "ASKDB_LLM_PROVIDER";
pub const LLM_TIMEOUT_ENV: &str = "ASKDB_LLM_TIMEOUT_SECS";

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const OPENAI_MODEL_ENV: &str = "OPENAI_MODEL";

pub const AZURE_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_DEPLOYMENT_ENV: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const AZURE_API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";

pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const ANTHROPIC_MODEL_ENV: &str = "ANTHROPIC_MODEL";

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4o";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no LLM provider configured; set OPENAI_API_KEY, AZURE_OPENAI_API_KEY and AZURE_OPENAI_ENDPOINT, or ANTHROPIC_API_KEY")]
    NoProviderConfigured,
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Azure,
    Anthropic,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "azure" | "azure-openai" => Ok(Provider::Azure),
            "anthropic" => Ok(Provider::Anthropic),
            _ => Err(ConfigError::Invalid {
                name: LLM_PROVIDER_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// Connection settings for one chat-model provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub provider: Provider,
    pub api_key: String,
    /// Model name, or the deployment name for Azure.
    pub model: String,
    pub base_url: String,
    /// Azure only.
    pub api_version: Option<String>,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the provider from `ASKDB_LLM_PROVIDER`, or else from whichever
    /// credentials are present (OpenAI, then Azure, then Anthropic).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get(LLM_PROVIDER_ENV) {
            Some(raw) => raw.parse()?,
            None if get(OPENAI_API_KEY_ENV).is_some() => Provider::OpenAI,
            None if get(AZURE_API_KEY_ENV).is_some() && get(AZURE_ENDPOINT_ENV).is_some() => {
                Provider::Azure
            }
            None if get(ANTHROPIC_API_KEY_ENV).is_some() => Provider::Anthropic,
            None => return Err(ConfigError::NoProviderConfigured),
        };

        let timeout = match get(LLM_TIMEOUT_ENV) {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid {
                    name: LLM_TIMEOUT_ENV,
                    value: raw.clone(),
                }
            })?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let config = match provider {
            Provider::OpenAI => Self {
                provider,
                api_key: get(OPENAI_API_KEY_ENV).ok_or(ConfigError::Missing(OPENAI_API_KEY_ENV))?,
                model: get(OPENAI_MODEL_ENV).unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: get(OPENAI_BASE_URL_ENV)
                    .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
                api_version: None,
                timeout,
            },
            Provider::Azure => Self {
                provider,
                api_key: get(AZURE_API_KEY_ENV).ok_or(ConfigError::Missing(AZURE_API_KEY_ENV))?,
                model: get(AZURE_DEPLOYMENT_ENV)
                    .unwrap_or_else(|| DEFAULT_AZURE_DEPLOYMENT.to_string()),
                base_url: get(AZURE_ENDPOINT_ENV).ok_or(ConfigError::Missing(AZURE_ENDPOINT_ENV))?,
                api_version: Some(
                    get(AZURE_API_VERSION_ENV)
                        .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
                ),
                timeout,
            },
            Provider::Anthropic => Self {
                provider,
                api_key: get(ANTHROPIC_API_KEY_ENV)
                    .ok_or(ConfigError::Missing(ANTHROPIC_API_KEY_ENV))?,
                model: get(ANTHROPIC_MODEL_ENV)
                    .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string()),
                base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
                api_version: None,
                timeout,
            },
        };
        Ok(config)
    }
}

/// Everything `askdb ask` needs besides the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Tool server base URL; `None` when the caller embeds a server instead.
    pub server_url: Option<String>,
    pub llm: LlmConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_url = lookup(SERVER_URL_ENV).filter(|v| !v.trim().is_empty());
        let llm = LlmConfig::from_lookup(&lookup)?;
        Ok(Self { server_url, llm })
    }
}
