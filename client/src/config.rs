//! Client configuration loaded from the environment.

use std::env;
use std::time::Duration;

const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Where the backend lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the HTTP API, without a trailing slash
    pub api_url: String,
    /// WebSocket endpoint for realtime channels
    pub realtime_url: String,
    /// Bearer token identifying the acting member
    pub token: Option<String>,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Build a config for `api_url`, deriving the realtime endpoint from it.
    pub fn new(api_url: impl Into<String>) -> Result<Self, ConfigError> {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        let realtime_url = realtime_url_for(&api_url)?;
        Ok(Self {
            api_url,
            realtime_url,
            token: None,
            request_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Load configuration from environment variables.
    ///
    /// `CLUB_API_URL`, `CLUB_REALTIME_URL`, `CLUB_TOKEN` and
    /// `CLUB_REQUEST_TIMEOUT_MS` are read; all are optional.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_url = env::var("CLUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let mut config = Self::new(api_url)?;

        if let Ok(url) = env::var("CLUB_REALTIME_URL") {
            config.realtime_url = url;
        }

        config.token = env::var("CLUB_TOKEN").ok().filter(|t| !t.is_empty());

        if let Ok(ms) = env::var("CLUB_REQUEST_TIMEOUT_MS") {
            let ms: u64 = ms.parse().map_err(|_| ConfigError::InvalidTimeout)?;
            config.request_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

/// `http://host/x` becomes `ws://host/x/realtime`, `https` becomes `wss`.
fn realtime_url_for(api_url: &str) -> Result<String, ConfigError> {
    let base = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ConfigError::InvalidApiUrl(api_url.to_string()));
    };
    Ok(format!("{base}/realtime"))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CLUB_API_URL must start with http:// or https://, got {0}")]
    InvalidApiUrl(String),

    #[error("Invalid CLUB_REQUEST_TIMEOUT_MS value")]
    InvalidTimeout,
}
