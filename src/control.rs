//! Keyboard control channel.
//!
//! When stdin is an interactive terminal, keys are read in raw mode:
//! `s` or space stops playback, Ctrl+C shuts the daemon down. Key events
//! are forwarded over a tokio channel to a task that drives the playback
//! handle, so the keyboard never touches audio state directly.

use std::io::IsTerminal;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::console;
use crate::playback::PlaybackHandle;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Operator inputs, independent of the HTTP protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Stop,
    Terminate,
}

/// Map a key press to a control signal.
pub fn classify(key: &KeyEvent) -> Option<ControlSignal> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl => Some(ControlSignal::Terminate),
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Char(' ') if !ctrl => {
            Some(ControlSignal::Stop)
        }
        _ => None,
    }
}

/// Restores cooked mode on drop.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        console::set_raw_mode(true);
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal mode: {e}");
        }
        console::set_raw_mode(false);
    }
}

pub struct ControlSignalListener;

impl ControlSignalListener {
    /// Start listening if stdin is a terminal. Returns `None` in automated
    /// mode; the daemon works the same without it.
    ///
    /// The returned task ends once `shutdown` is cancelled, restoring the
    /// terminal on its way out.
    pub fn install(playback: PlaybackHandle, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if !std::io::stdin().is_terminal() {
            info!("No interactive terminal, keyboard controls disabled");
            return None;
        }

        let guard = match RawModeGuard::enable() {
            Ok(guard) => guard,
            Err(e) => {
                warn!("Cannot enable raw terminal mode: {e}, keyboard controls disabled");
                return None;
            }
        };

        let (tx, rx) = mpsc::channel::<ControlSignal>(16);

        let reader_shutdown = shutdown.clone();
        let spawned = std::thread::Builder::new()
            .name("control-keys".into())
            .spawn(move || read_keys(tx, reader_shutdown));
        if let Err(e) = spawned {
            warn!("Cannot start keyboard reader: {e}, keyboard controls disabled");
            return None;
        }

        Some(tokio::spawn(async move {
            let _guard = guard;
            drive(rx, playback, shutdown).await;
        }))
    }
}

/// Blocking key reader. Polls so it notices shutdown.
fn read_keys(tx: mpsc::Sender<ControlSignal>, shutdown: CancellationToken) {
    while !shutdown.is_cancelled() {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                warn!("Keyboard input failed: {e}");
                break;
            }
        }

        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!("Keyboard input failed: {e}");
                break;
            }
        };

        if let Some(signal) = classify(&key) {
            debug!("Control signal: {signal:?}");
            if tx.blocking_send(signal).is_err() {
                break;
            }
        }
    }
}

/// Apply control signals until shutdown.
pub async fn drive(
    mut rx: mpsc::Receiver<ControlSignal>,
    playback: PlaybackHandle,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            signal = rx.recv() => match signal {
                Some(ControlSignal::Stop) => match playback.stop().await {
                    Ok(true) => info!("Audio stopped"),
                    Ok(false) => debug!("Nothing playing"),
                    Err(e) => warn!("Cannot stop audio: {e}"),
                },
                Some(ControlSignal::Terminate) => {
                    info!("Shutting down...");
                    shutdown.cancel();
                    break;
                }
                None => {
                    warn!("Keyboard channel closed");
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn stop_keys() {
        for code in [KeyCode::Char('s'), KeyCode::Char('S'), KeyCode::Char(' ')] {
            assert_eq!(classify(&press(code, KeyModifiers::NONE)), Some(ControlSignal::Stop));
        }
    }

    #[test]
    fn ctrl_c_terminates() {
        assert_eq!(
            classify(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(ControlSignal::Terminate)
        );
        assert_eq!(classify(&press(KeyCode::Char('c'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn other_keys_and_releases_are_ignored() {
        assert_eq!(classify(&press(KeyCode::Char('q'), KeyModifiers::NONE)), None);
        assert_eq!(classify(&press(KeyCode::Enter, KeyModifiers::NONE)), None);
        assert_eq!(classify(&press(KeyCode::Char('s'), KeyModifiers::CONTROL)), None);

        let mut release = press(KeyCode::Char('s'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(classify(&release), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_signal_ends_active_session() {
        use crate::config::ChannelCommand;
        use crate::playback::PlaybackOrchestrator;

        let playback = PlaybackOrchestrator::spawn(
            ChannelCommand::new("sh", &["-c", "sleep 5", "sh"]),
            ChannelCommand::new("sh", &["-c", "sleep 5", "sh"]),
        );
        let shutdown = CancellationToken::new();
        let (tx, rx) = mpsc::channel(4);
        let driver = tokio::spawn(drive(rx, playback.clone(), shutdown.clone()));

        playback.start("a.mp3".into(), "hello".into()).await.unwrap();
        assert!(playback.status().await.unwrap().is_active());

        tx.send(ControlSignal::Stop).await.unwrap();
        // A second stop while idle is harmless.
        tx.send(ControlSignal::Stop).await.unwrap();
        tx.send(ControlSignal::Terminate).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), driver).await.unwrap().unwrap();
        assert!(shutdown.is_cancelled());
        assert!(!playback.status().await.unwrap().is_active());
    }
}
