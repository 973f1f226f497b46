//! HTTP client for the notification daemon, shared by the `notify` CLI and
//! the MCP adapter.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

pub const DEFAULT_URL: &str = "http://127.0.0.1:8881";

/// Environment variable overriding the daemon URL.
pub const URL_ENV: &str = "AGENT_NOTIFY_URL";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("{error} (HTTP {status})")]
    Rejected { status: StatusCode, error: String },
}

#[derive(Deserialize)]
struct AckBody {
    message: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct NotifyClient {
    base_url: String,
    http: Client,
}

impl NotifyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one notification. Returns the daemon's acknowledgment message.
    pub async fn notify(&self, kind: &str, message: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .get(format!("{}/agent-notify", self.base_url))
            .query(&[("type", kind), ("message", message)])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let body: AckBody = resp.json().await?;
            return Ok(body.message);
        }

        let text = resp.text().await.unwrap_or_default();
        let error = serde_json::from_str::<ErrorBody>(&text)
            .map(|b| b.error)
            .unwrap_or(text);
        Err(ClientError::Rejected { status, error })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::server::tests::spawn_daemon;

    #[tokio::test]
    async fn message_is_url_encoded() {
        let (base, playback) = spawn_daemon("sleep 1").await;
        let client = NotifyClient::new(format!("{base}/"));

        let ack = client.notify("status", "50% done & counting?").await.unwrap();
        assert_eq!(ack, "Notification received and processing");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(playback.status().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn rejection_carries_server_error() {
        let (base, _playback) = spawn_daemon("true").await;
        let client = NotifyClient::new(base);

        match client.notify("review", "Please look").await {
            Err(ClientError::Rejected { status, error }) => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert!(error.starts_with("Unknown notification type: review."));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_daemon_is_a_transport_error() {
        // Grab a free port, then close it.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = NotifyClient::new(format!("http://{addr}"));
        assert!(matches!(
            client.notify("done", "x").await,
            Err(ClientError::Transport(_))
        ));
    }
}
