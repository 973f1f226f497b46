//! Validates incoming notifications, acknowledges them and hands playback
//! off to the orchestrator without waiting on it.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::catalog::{NotificationType, SoundCatalog};
use crate::console;
use crate::playback::PlaybackHandle;

pub const ACK_MESSAGE: &str = "Notification received and processing";

/// Request fields exactly as they arrived; either may be absent.
#[derive(Debug, Clone, Default)]
pub struct RawNotification {
    pub kind: Option<String>,
    pub message: Option<String>,
}

impl RawNotification {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRequest {
    pub kind: NotificationType,
    pub message: String,
    pub sound_asset: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Missing required parameters: type and message")]
    MissingParameters,
    #[error("Unknown notification type: {0}. Valid types: {valid}", valid = NotificationType::valid_list())]
    UnknownType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub kind: NotificationType,
}

impl Ack {
    pub fn message(&self) -> &'static str {
        ACK_MESSAGE
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    catalog: Arc<SoundCatalog>,
    playback: PlaybackHandle,
}

impl NotificationDispatcher {
    pub fn new(catalog: Arc<SoundCatalog>, playback: PlaybackHandle) -> Self {
        Self { catalog, playback }
    }

    pub fn catalog(&self) -> &SoundCatalog {
        &self.catalog
    }

    /// Log, validate, acknowledge, then launch playback in the background.
    ///
    /// The returned `Ack` does not depend on how playback goes.
    pub fn handle(&self, raw: RawNotification) -> Result<Ack, ValidationError> {
        console::echo_notification(raw.kind.as_deref(), raw.message.as_deref());

        let request = self.validate(raw)?;
        let ack = Ack { kind: request.kind };
        self.launch(request);
        Ok(ack)
    }

    pub fn validate(&self, raw: RawNotification) -> Result<NotificationRequest, ValidationError> {
        let (Some(kind), Some(message)) = (
            raw.kind.filter(|k| !k.is_empty()),
            raw.message.filter(|m| !m.is_empty()),
        ) else {
            return Err(ValidationError::MissingParameters);
        };

        let entry = self
            .catalog
            .lookup(&kind)
            .ok_or(ValidationError::UnknownType(kind))?;

        Ok(NotificationRequest {
            kind: entry.kind,
            message,
            sound_asset: entry.sound_asset.clone(),
        })
    }

    fn launch(&self, request: NotificationRequest) {
        let NotificationRequest { kind, message, sound_asset } = request;
        let playback = self.playback.clone();

        // Fire-and-forget: the caller already has its answer.
        tokio::spawn(async move {
            // Let the handler's response go out before any audio starts.
            tokio::task::yield_now().await;
            match playback.start(sound_asset, message).await {
                Ok(session) => debug!("Dispatched {kind} as session {session}"),
                Err(e) => warn!("Error in audio playback: {e}"),
            }
        });
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::config::ChannelCommand;
    use crate::playback::{PlaybackEvent, PlaybackOrchestrator};
    use std::path::Path;
    use std::time::Duration;

    fn dispatcher(player: &str) -> (NotificationDispatcher, PlaybackHandle) {
        let playback = PlaybackOrchestrator::spawn(
            ChannelCommand::new("sh", &["-c", player, "sh"]),
            ChannelCommand::new("sh", &["-c", "true", "sh"]),
        );
        let catalog = Arc::new(SoundCatalog::new(Path::new("./sounds")));
        (NotificationDispatcher::new(catalog, playback.clone()), playback)
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_playback() {
        let (dispatcher, playback) = dispatcher("sleep 1");
        let cases = [
            RawNotification::default(),
            RawNotification { kind: Some("done".into()), message: None },
            RawNotification { kind: None, message: Some("hi".into()) },
            RawNotification::new("done", ""),
            RawNotification::new("", "hi"),
        ];
        for raw in cases {
            assert_eq!(dispatcher.handle(raw), Err(ValidationError::MissingParameters));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!playback.status().await.unwrap().is_active());
    }

    #[tokio::test]
    async fn unknown_type_lists_valid_types() {
        let (dispatcher, _playback) = dispatcher("true");
        let err = dispatcher.handle(RawNotification::new("review", "x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown notification type: review. Valid types: question, permission, done, error, status, waiting"
        );
    }

    #[tokio::test]
    async fn ack_returns_before_sound_completes() {
        let (dispatcher, playback) = dispatcher("sleep 1");
        let mut events = playback.subscribe();

        let ack = dispatcher.handle(RawNotification::new("done", "Build finished")).unwrap();
        assert_eq!(ack.kind, NotificationType::Done);
        assert_eq!(ack.message(), ACK_MESSAGE);

        // The ack is already in hand; the session only starts afterwards.
        let first = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, PlaybackEvent::SessionStarted { .. }));
        let status = playback.status().await.unwrap();
        assert!(status.is_active());
    }

    #[tokio::test]
    async fn validate_resolves_catalog_type() {
        let (dispatcher, _playback) = dispatcher("true");
        let request = dispatcher.validate(RawNotification::new("waiting", "Still here")).unwrap();
        assert_eq!(
            request,
            NotificationRequest {
                kind: NotificationType::Waiting,
                message: "Still here".into(),
                sound_asset: PathBuf::from("./sounds/waiting.mp3"),
            }
        );
    }
}
