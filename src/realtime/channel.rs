//! WebSocket subscription to server-pushed vote events.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::{parse_frame, RealtimeMessage};
use crate::client::ForumClient;
use crate::config::ClientConfig;
use crate::errors::ClientError;

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Shutdown,
    /// The server closed the connection
    Closed,
}

/// Reconnecting reader of the realtime vote channel.
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    url: String,
    token: Option<String>,
    reconnect_delay: Duration,
}

impl RealtimeChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            reconnect_delay: Duration::from_secs(2),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Channel from configuration, `None` when no realtime URL is set.
    pub fn from_config(config: &ClientConfig) -> Option<Self> {
        let url = config.realtime_url.as_ref()?;
        let mut channel = Self::new(url.clone()).with_reconnect_delay(config.reconnect_delay);
        if let Some(token) = &config.api_token {
            channel = channel.with_token(token.clone());
        }
        Some(channel)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Apply pushed events to `client` until `shutdown` turns true or its
    /// sender is dropped. Reconnects after every lost session.
    pub async fn run(self, client: ForumClient, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            match self.session(&client, &mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::Closed) => tracing::info!("Realtime channel closed by server"),
                Err(err) => tracing::warn!("Realtime session failed: {}", err),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Realtime channel stopped");
    }

    /// One connection to the channel.
    pub async fn session(
        &self,
        client: &ForumClient,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, ClientError> {
        let mut request = self.url.as_str().into_client_request()?;
        if let Some(token) = &self.token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ClientError::Config("API token is not a valid header".to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, _) = tokio::select! {
            connected = tokio_tungstenite::connect_async(request) => connected?,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(SessionEnd::Shutdown);
                }
                return Ok(SessionEnd::Closed);
            }
        };
        tracing::info!("Realtime channel connected to {}", self.url);
        let (mut sender, mut receiver) = stream.split();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        let _ = sender.send(Message::Close(None)).await;
                        return Ok(SessionEnd::Shutdown);
                    }
                }
                message = receiver.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(client, text.as_str());
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                }
            }
        }
    }
}

/// Apply one text frame. Returns the number of cached records updated.
pub fn handle_frame(client: &ForumClient, text: &str) -> usize {
    match parse_frame(text) {
        Ok(RealtimeMessage::PostVote(event)) => {
            let records = client.apply_vote_event(&event);
            tracing::debug!(
                "Vote event for {} updated {} cached records",
                event.post_id,
                records
            );
            records
        }
        Ok(RealtimeMessage::Ping) => 0,
        Ok(RealtimeMessage::Unknown(kind)) => {
            tracing::trace!("Ignoring realtime frame {}", kind);
            0
        }
        Err(err) => {
            tracing::warn!("Malformed realtime frame: {}", err);
            0
        }
    }
}
