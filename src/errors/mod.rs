//! Error handling module for the forum client.
//!
//! Provides a single cloneable error type so failures can be stored on cache
//! entries and handed to subscribers without losing detail.

use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const TRANSPORT_ERROR: &str = "TRANSPORT_ERROR";
    pub const API_ERROR: &str = "API_ERROR";
    pub const DECODE_ERROR: &str = "DECODE_ERROR";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const REALTIME_ERROR: &str = "REALTIME_ERROR";
    pub const NOT_CACHED: &str = "NOT_CACHED";
}

/// Client error type.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Network failure, timeout or refused connection
    Transport(String),
    /// Non-success HTTP status returned by the API
    Api {
        status: u16,
        message: String,
        details: Option<Vec<serde_json::Value>>,
    },
    /// Response body could not be decoded
    Decode(String),
    /// Invalid configuration value
    Config(String),
    /// Realtime channel failure
    Realtime(String),
    /// Mutation target is not present in any cache entry
    NotCached(String),
}

impl ClientError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => codes::TRANSPORT_ERROR,
            ClientError::Api { .. } => codes::API_ERROR,
            ClientError::Decode(_) => codes::DECODE_ERROR,
            ClientError::Config(_) => codes::CONFIG_ERROR,
            ClientError::Realtime(_) => codes::REALTIME_ERROR,
            ClientError::NotCached(_) => codes::NOT_CACHED,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            ClientError::Transport(msg) => msg.clone(),
            ClientError::Api { status, message, .. } => format!("HTTP {}: {}", status, message),
            ClientError::Decode(msg) => msg.clone(),
            ClientError::Config(msg) => msg.clone(),
            ClientError::Realtime(msg) => msg.clone(),
            ClientError::NotCached(msg) => msg.clone(),
        }
    }

    /// HTTP status, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an API error from a status code and a raw response body.
    ///
    /// Bodies shaped like `{ "error": "...", "details": [...] }` are unpacked;
    /// anything else is kept verbatim as the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ApiErrorBody>(body) {
            Ok(parsed) => ClientError::Api {
                status,
                message: parsed.error,
                details: parsed.details,
            },
            Err(_) => ClientError::Api {
                status,
                message: if body.trim().is_empty() {
                    "request failed".to_string()
                } else {
                    body.trim().to_string()
                },
                details: None,
            },
        }
    }
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for ClientError {}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            tracing::error!("Response decode error: {:?}", err);
            return ClientError::Decode(format!("Decode error: {}", err));
        }
        if let Some(status) = err.status() {
            return ClientError::Api {
                status: status.as_u16(),
                message: err.to_string(),
                details: None,
            };
        }
        tracing::warn!("Transport error: {:?}", err);
        ClientError::Transport(format!("Transport error: {}", err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        ClientError::Decode(format!("JSON error: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        tracing::warn!("Realtime channel error: {:?}", err);
        ClientError::Realtime(format!("WebSocket error: {}", err))
    }
}

/// Structured error body returned by mutation endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}
