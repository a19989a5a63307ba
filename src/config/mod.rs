//! Configuration module for the forum client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use crate::errors::ClientError;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,
    /// WebSocket URL of the realtime vote channel
    pub realtime_url: Option<String>,
    /// Persisted bearer token of the signed-in user
    pub api_token: Option<String>,
    /// Id of the authenticated viewer
    pub viewer_id: Option<String>,
    /// Page size requested by listing pagers
    pub page_limit: u32,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Delay before the realtime channel reconnects
    pub reconnect_delay: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".to_string(),
            realtime_url: None,
            api_token: None,
            viewer_id: None,
            page_limit: 10,
            request_timeout: Duration::from_secs(15),
            reconnect_delay: Duration::from_millis(2000),
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_base_url = env::var("FARMFORUM_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let page_limit = parse_var("FARMFORUM_PAGE_LIMIT", defaults.page_limit)?;
        if page_limit == 0 {
            return Err(ClientError::Config(
                "FARMFORUM_PAGE_LIMIT must be greater than zero".to_string(),
            ));
        }

        let timeout_secs = parse_var(
            "FARMFORUM_REQUEST_TIMEOUT_SECS",
            defaults.request_timeout.as_secs(),
        )?;
        let reconnect_ms = parse_var(
            "FARMFORUM_RECONNECT_DELAY_MS",
            defaults.reconnect_delay.as_millis() as u64,
        )?;

        Ok(Self {
            api_base_url,
            realtime_url: non_empty_var("FARMFORUM_REALTIME_URL"),
            api_token: non_empty_var("FARMFORUM_API_TOKEN"),
            viewer_id: non_empty_var("FARMFORUM_VIEWER_ID"),
            page_limit,
            request_timeout: Duration::from_secs(timeout_secs),
            reconnect_delay: Duration::from_millis(reconnect_ms),
            log_level: env::var("FARMFORUM_LOG_LEVEL").unwrap_or(defaults.log_level),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ClientError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ClientError::Config(format!("Invalid {} value: {:?}", name, raw))),
        Err(_) => Ok(default),
    }
}
