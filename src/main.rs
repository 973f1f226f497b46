//! agent-notify: notification daemon.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent_notify::catalog::SoundCatalog;
use agent_notify::config::{BindAddress, Config};
use agent_notify::console;
use agent_notify::control::ControlSignalListener;
use agent_notify::dispatcher::NotificationDispatcher;
use agent_notify::playback::PlaybackOrchestrator;
use agent_notify::server;

#[derive(Parser, Debug)]
#[command(name = "agent-notify", about = "Audio notification daemon for coding agents")]
struct Args {
    /// Listen address: host:port or a bare port
    #[arg(short, long)]
    address: Option<String>,

    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding <type>.mp3 sound files
    #[arg(long)]
    sounds_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize logging (suppress noisy HTTP internals)
    let default_filter = if args.verbose {
        "debug,hyper=info"
    } else {
        "info,hyper=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(console::stdout)
        .init();

    let config = Config::load(args.config.as_deref());
    let address = BindAddress::parse(args.address.as_deref().unwrap_or(&config.server.address));
    let sounds_dir = args.sounds_dir.unwrap_or(config.sounds.dir);

    let catalog = SoundCatalog::new(&sounds_dir);
    for entry in catalog.missing_assets() {
        warn!("Sound file for {} not found: {}", entry.kind, entry.sound_asset.display());
    }

    info!("Sound player: {}, speech: {}", config.player.program, config.speech.program);
    let playback = PlaybackOrchestrator::spawn(config.player, config.speech);
    let dispatcher = NotificationDispatcher::new(Arc::new(catalog), playback.clone());

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));
    let control = ControlSignalListener::install(playback.clone(), shutdown.clone());

    let listener = TcpListener::bind((address.host.as_str(), address.port)).await?;
    print_banner(&address, &sounds_dir, dispatcher.catalog(), control.is_some());

    server::serve(listener, dispatcher, shutdown.clone().cancelled_owned()).await?;

    info!("Shutting down...");
    shutdown.cancel();
    if let Err(e) = playback.stop().await {
        warn!("{e}");
    }
    if let Some(control) = control {
        let _ = control.await;
    }

    Ok(())
}

/// SIGINT / SIGTERM trigger the same graceful shutdown as the Ctrl+C key.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = shutdown.cancelled() => return,
    }
    shutdown.cancel();
}

fn print_banner(address: &BindAddress, sounds_dir: &std::path::Path, catalog: &SoundCatalog, keyboard: bool) {
    let sounds = sounds_dir.canonicalize().unwrap_or_else(|_| sounds_dir.to_path_buf());
    info!("Agent notification server started");
    info!("Listening on http://{address}/agent-notify");
    info!("Sound files directory: {}", sounds.display());
    info!("Available notification types:");
    for entry in catalog.entries() {
        info!(
            "  - {:<10} → plays {}",
            entry.kind.as_str(),
            entry.kind.sound_file()
        );
    }
    if keyboard {
        info!("Keyboard controls: [S] or [SPACE] stops all audio, [Ctrl+C] exits");
    }
    info!("Ready to receive agent notifications");
}
