//! HTTP endpoint for agent notifications.
//!
//! `GET /agent-notify?type=<type>&message=<text>` and `GET /health`.

use std::future::Future;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

use crate::dispatcher::{NotificationDispatcher, RawNotification, ValidationError};

pub const HEALTH_MESSAGE: &str = "Agent notification server is running";

// --- Request/Response types ---

#[derive(Debug, Deserialize)]
struct NotifyQuery {
    #[serde(rename = "type")]
    kind: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
struct AckResponse {
    success: bool,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

/// Build the axum router.
pub fn router(dispatcher: NotificationDispatcher) -> Router {
    Router::new()
        .route("/agent-notify", get(handle_notify))
        .route("/health", get(handle_health))
        .with_state(dispatcher)
}

/// Serve until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    dispatcher: NotificationDispatcher,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
}

// --- Handlers ---

async fn handle_notify(
    State(dispatcher): State<NotificationDispatcher>,
    query: Result<Query<NotifyQuery>, QueryRejection>,
) -> Result<Json<AckResponse>, ValidationError> {
    let Query(query) = query.map_err(|rejection| {
        debug!("Unreadable notification query: {rejection}");
        ValidationError::MissingParameters
    })?;
    let ack = dispatcher.handle(RawNotification {
        kind: query.kind,
        message: query.message,
    })?;

    Ok(Json(AckResponse {
        success: true,
        message: ack.message(),
    }))
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: HEALTH_MESSAGE,
    })
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::SoundCatalog;
    use crate::config::ChannelCommand;
    use crate::playback::{PlaybackHandle, PlaybackOrchestrator};
    use serde_json::Value;
    use std::path::Path;
    use std::sync::Arc;

    /// Serve a daemon on an ephemeral port whose sound channel runs `player`.
    pub(crate) async fn spawn_daemon(player: &str) -> (String, PlaybackHandle) {
        let playback = PlaybackOrchestrator::spawn(
            ChannelCommand::new("sh", &["-c", player, "sh"]),
            ChannelCommand::new("sh", &["-c", "true", "sh"]),
        );
        let catalog = Arc::new(SoundCatalog::new(Path::new("./sounds")));
        let dispatcher = NotificationDispatcher::new(catalog, playback.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener, dispatcher, std::future::pending()));

        (format!("http://{addr}"), playback)
    }

    async fn get(url: &str) -> (u16, Value) {
        let resp = reqwest::get(url).await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (base, _playback) = spawn_daemon("true").await;
        let (status, body) = get(&format!("{base}/health")).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["message"], HEALTH_MESSAGE);
    }

    #[tokio::test]
    async fn valid_notification_is_acknowledged_while_sound_plays() {
        let (base, playback) = spawn_daemon("sleep 2").await;
        let (status, body) = get(&format!("{base}/agent-notify?type=done&message=Build%20finished")).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Notification received and processing");

        // The response came back while the two-second sound is still going.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(playback.status().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn unknown_type_is_rejected() {
        let (base, playback) = spawn_daemon("true").await;
        let (status, body) = get(&format!("{base}/agent-notify?type=bogus&message=x")).await;
        assert_eq!(status, 400);
        let error = body["error"].as_str().unwrap();
        assert!(error.contains("Unknown notification type: bogus"));
        assert!(error.ends_with("Valid types: question, permission, done, error, status, waiting"));
        assert!(!playback.status().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn empty_or_missing_parameters_are_rejected() {
        let (base, _playback) = spawn_daemon("true").await;
        for query in ["type=done&message=", "message=hello", "type=done", ""] {
            let (status, body) = get(&format!("{base}/agent-notify?{query}")).await;
            assert_eq!(status, 400, "query {query:?}");
            assert_eq!(body["error"], "Missing required parameters: type and message");
        }
    }

    #[tokio::test]
    async fn malformed_query_gets_json_error() {
        let (base, playback) = spawn_daemon("true").await;
        let (status, body) = get(&format!("{base}/agent-notify?type=done&type=error&message=x")).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Missing required parameters: type and message");
        assert!(!playback.status().await.unwrap().is_active());
    }
}
