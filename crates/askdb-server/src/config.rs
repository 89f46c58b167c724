use std::path::PathBuf;
use std::str::FromStr;

pub const DATABASE_ENV: &str = "ASKDB_DATABASE";
pub const BIND_HOST_ENV: &str = "ASKDB_BIND_HOST";
pub const BIND_PORT_ENV: &str = "ASKDB_BIND_PORT";
pub const TRANSPORT_ENV: &str = "ASKDB_TRANSPORT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Http,
    Stdio,
}

impl FromStr for Transport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "streamable-http" => Ok(Transport::Http),
            "stdio" => Ok(Transport::Stdio),
            _ => Err(ConfigError::Invalid {
                name: TRANSPORT_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// Tool server settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    pub transport: Transport,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = get(DATABASE_ENV)
            .map(PathBuf::from)
            .ok_or(ConfigError::Missing(DATABASE_ENV))?;
        let host = get(BIND_HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(BIND_PORT_ENV) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: BIND_PORT_ENV,
                value: raw.clone(),
            })?,
            None => DEFAULT_PORT,
        };
        let transport = match get(TRANSPORT_ENV) {
            Some(raw) => raw.parse()?,
            None => Transport::default(),
        };

        Ok(Self {
            database,
            host,
            port,
            transport,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
