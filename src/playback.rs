//! Playback orchestration: one alert sound and one spoken message per session,
//! deliberately overlapping.
//!
//! Session lifecycle: IDLE → PLAYING → IDLE, or PLAYING → CANCELLED → IDLE.
//!
//! The orchestrator runs as a single task that owns the current session.
//! Everything else (dispatcher, keyboard listener, the channel tasks
//! themselves) talks to it through one command queue, so "set handle" and
//! "kill handle" can never interleave.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ChannelCommand;

/// Delay between launching the sound and launching speech.
pub const SPEECH_OFFSET: Duration = Duration::from_millis(500);

const COMMAND_QUEUE: usize = 32;
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Sound,
    Speech,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sound => write!(f, "sound"),
            Self::Speech => write!(f, "speech"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}")]
    Exit { program: String, status: ExitStatus },
}

/// How a channel ended. `Stopped` is only produced by an explicit stop and
/// is never treated as a failure.
#[derive(Debug, Clone)]
pub enum ChannelOutcome {
    Completed,
    Stopped,
    Failed(Arc<PlaybackError>),
}

impl ChannelOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Waiting to launch (speech during its offset).
    Scheduled,
    Playing,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub id: u64,
    pub sound: ChannelState,
    pub speech: ChannelState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub session: Option<SessionStatus>,
}

impl PlaybackStatus {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }
}

/// Observable lifecycle events, broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    SessionStarted { session: u64 },
    ChannelStarted { session: u64, channel: Channel, at: Instant },
    ChannelFinished { session: u64, channel: Channel, outcome: ChannelOutcome },
    SessionFinished { session: u64 },
    SessionCancelled { session: u64 },
}

#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("playback orchestrator is not running")]
pub struct OrchestratorGone;

enum Command {
    Start {
        sound: PathBuf,
        text: String,
        reply: oneshot::Sender<u64>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<PlaybackStatus>,
    },
    Launched {
        session: u64,
        channel: Channel,
        at: Instant,
    },
    Finished {
        session: u64,
        channel: Channel,
        outcome: ChannelOutcome,
    },
}

/// Cloneable capability to drive the orchestrator. Holders never touch the
/// audio processes directly.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<Command>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackHandle {
    /// Begin a new session, replacing (stopping) any session still playing.
    /// Returns the new session id.
    pub async fn start(&self, sound: PathBuf, text: String) -> Result<u64, OrchestratorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start { sound, text, reply }).await?;
        rx.await.map_err(|_| OrchestratorGone)
    }

    /// Stop the current session. Returns `false` when nothing was playing.
    pub async fn stop(&self) -> Result<bool, OrchestratorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop { reply }).await?;
        rx.await.map_err(|_| OrchestratorGone)
    }

    pub async fn status(&self) -> Result<PlaybackStatus, OrchestratorGone> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Status { reply }).await?;
        rx.await.map_err(|_| OrchestratorGone)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: Command) -> Result<(), OrchestratorGone> {
        self.tx.send(command).await.map_err(|_| OrchestratorGone)
    }
}

struct PlaybackSession {
    id: u64,
    cancel: CancellationToken,
    sound: ChannelState,
    speech: ChannelState,
}

impl PlaybackSession {
    fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        match channel {
            Channel::Sound => &mut self.sound,
            Channel::Speech => &mut self.speech,
        }
    }

    fn is_finished(&self) -> bool {
        self.sound == ChannelState::Done && self.speech == ChannelState::Done
    }

    fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id,
            sound: self.sound,
            speech: self.speech,
        }
    }
}

pub struct PlaybackOrchestrator {
    player: ChannelCommand,
    speech: ChannelCommand,
    current: Option<PlaybackSession>,
    next_id: u64,
    rx: mpsc::Receiver<Command>,
    // Weak so the loop ends once every handle is dropped.
    tx: mpsc::WeakSender<Command>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackOrchestrator {
    /// Spawn the orchestrator task and return a handle to it.
    pub fn spawn(player: ChannelCommand, speech: ChannelCommand) -> PlaybackHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let orchestrator = Self {
            player,
            speech,
            current: None,
            next_id: 1,
            rx,
            tx: tx.downgrade(),
            events: events.clone(),
        };
        tokio::spawn(orchestrator.run());

        PlaybackHandle { tx, events }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Start { sound, text, reply } => {
                    let id = self.start(sound, text);
                    let _ = reply.send(id);
                }
                Command::Stop { reply } => {
                    let stopped = self.stop();
                    let _ = reply.send(stopped);
                }
                Command::Status { reply } => {
                    let _ = reply.send(PlaybackStatus {
                        session: self.current.as_ref().map(PlaybackSession::status),
                    });
                }
                Command::Launched { session, channel, at } => self.on_launched(session, channel, at),
                Command::Finished { session, channel, outcome } => {
                    self.on_finished(session, channel, outcome)
                }
            }
        }

        // All handles dropped: make sure nothing keeps playing.
        self.stop();
        debug!("Playback orchestrator stopped");
    }

    fn start(&mut self, sound: PathBuf, text: String) -> u64 {
        if let Some(previous) = self.current.as_ref() {
            info!("Session {} still playing, replacing it", previous.id);
            self.stop();
        }

        let id = self.next_id;
        self.next_id += 1;

        let cancel = CancellationToken::new();
        self.current = Some(PlaybackSession {
            id,
            cancel: cancel.clone(),
            sound: ChannelState::Scheduled,
            speech: ChannelState::Scheduled,
        });
        self.emit(PlaybackEvent::SessionStarted { session: id });
        debug!("Session {id}: IDLE → PLAYING");

        let Some(tx) = self.tx.upgrade() else {
            // Only reachable while shutting down.
            return id;
        };

        let (sound_launched, wait_for_sound) = oneshot::channel();

        tokio::spawn(run_channel(ChannelTask {
            session: id,
            channel: Channel::Sound,
            command: self.player.clone(),
            arg: sound.into_os_string(),
            cancel: cancel.clone(),
            tx: tx.clone(),
            gate: Gate::Announce(sound_launched),
        }));

        tokio::spawn(run_channel(ChannelTask {
            session: id,
            channel: Channel::Speech,
            command: self.speech.clone(),
            arg: OsString::from(text),
            cancel,
            tx,
            gate: Gate::After(wait_for_sound, SPEECH_OFFSET),
        }));

        id
    }

    fn stop(&mut self) -> bool {
        let Some(session) = self.current.take() else {
            return false;
        };

        info!("Stopping all audio (session {})", session.id);
        session.cancel.cancel();
        self.emit(PlaybackEvent::SessionCancelled { session: session.id });
        debug!("Session {}: PLAYING → CANCELLED → IDLE", session.id);
        true
    }

    fn on_launched(&mut self, session: u64, channel: Channel, at: Instant) {
        if let Some(current) = self.current.as_mut().filter(|s| s.id == session) {
            *current.channel_mut(channel) = ChannelState::Playing;
        }
        debug!("Session {session}: {channel} started");
        self.emit(PlaybackEvent::ChannelStarted { session, channel, at });
    }

    fn on_finished(&mut self, session: u64, channel: Channel, outcome: ChannelOutcome) {
        match &outcome {
            ChannelOutcome::Completed => debug!("Session {session}: {channel} completed"),
            ChannelOutcome::Stopped => debug!("Session {session}: {channel} stopped"),
            ChannelOutcome::Failed(e) => match channel {
                Channel::Sound => error!("Error playing sound: {e}"),
                Channel::Speech => error!("Error vocalizing text: {e}"),
            },
        }
        self.emit(PlaybackEvent::ChannelFinished { session, channel, outcome });

        let Some(current) = self.current.as_mut().filter(|s| s.id == session) else {
            return;
        };
        *current.channel_mut(channel) = ChannelState::Done;

        if current.is_finished() {
            self.current = None;
            debug!("Session {session}: PLAYING → IDLE");
            self.emit(PlaybackEvent::SessionFinished { session });
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        // No subscribers is the normal case outside tests.
        let _ = self.events.send(event);
    }
}

/// What a channel waits for before launching.
enum Gate {
    /// Launch immediately and signal once the process is up (or failed).
    Announce(oneshot::Sender<()>),
    /// Wait for the paired signal, then for the offset.
    After(oneshot::Receiver<()>, Duration),
}

struct ChannelTask {
    session: u64,
    channel: Channel,
    command: ChannelCommand,
    arg: OsString,
    cancel: CancellationToken,
    tx: mpsc::Sender<Command>,
    gate: Gate,
}

async fn run_channel(task: ChannelTask) {
    let ChannelTask {
        session,
        channel,
        command,
        arg,
        cancel,
        tx,
        gate,
    } = task;

    let mut announce = match gate {
        Gate::Announce(signal) => Some(signal),
        Gate::After(signal, offset) => {
            let waited = tokio::select! {
                _ = cancel.cancelled() => false,
                _ = async {
                    // A dropped sender still releases the gate.
                    let _ = signal.await;
                    tokio::time::sleep(offset).await;
                } => true,
            };
            if !waited {
                let _ = tx
                    .send(Command::Finished { session, channel, outcome: ChannelOutcome::Stopped })
                    .await;
                return;
            }
            None
        }
    };

    let outcome = if cancel.is_cancelled() {
        ChannelOutcome::Stopped
    } else {
        match launch(&command, arg) {
            Ok(child) => {
                let at = Instant::now();
                let _ = tx.send(Command::Launched { session, channel, at }).await;
                release(&mut announce);
                supervise(child, &command.program, &cancel).await
            }
            Err(e) => ChannelOutcome::Failed(Arc::new(e)),
        }
    };
    release(&mut announce);

    let _ = tx.send(Command::Finished { session, channel, outcome }).await;
}

fn release(announce: &mut Option<oneshot::Sender<()>>) {
    if let Some(signal) = announce.take() {
        let _ = signal.send(());
    }
}

fn launch(command: &ChannelCommand, arg: OsString) -> Result<Child, PlaybackError> {
    ProcessCommand::new(&command.program)
        .args(&command.args)
        .arg(arg)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| PlaybackError::Spawn {
            program: command.program.clone(),
            source,
        })
}

/// Wait for the channel program to exit, or kill it when cancelled.
async fn supervise(mut child: Child, program: &str, cancel: &CancellationToken) -> ChannelOutcome {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) if status.success() => ChannelOutcome::Completed,
            Ok(status) => ChannelOutcome::Failed(Arc::new(PlaybackError::Exit {
                program: program.to_string(),
                status,
            })),
            Err(source) => ChannelOutcome::Failed(Arc::new(PlaybackError::Wait {
                program: program.to_string(),
                source,
            })),
        },
        _ = cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                debug!("{program} already exited: {e}");
            }
            ChannelOutcome::Stopped
        }
    }
}
