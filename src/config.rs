//! Configuration management for agent-notify.
//!
//! Loads config from YAML files in standard locations. Every section is
//! optional and falls back to its defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8881;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// `host:port` or a bare `port`.
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SoundsConfig {
    pub dir: PathBuf,
}

impl Default for SoundsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./sounds"),
        }
    }
}

/// An external program used as an audio channel. The asset path (sound) or
/// the text (speech) is appended as the last argument. Speech text is free
/// input, so speech commands end their args with `--`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ChannelCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn default_player() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("afplay", &[])
        } else {
            Self::new("mpg123", &["-q"])
        }
    }

    pub fn default_speech() -> Self {
        if cfg!(target_os = "macos") {
            Self::new("say", &["--"])
        } else {
            Self::new("espeak-ng", &["--"])
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sounds: SoundsConfig,
    pub player: ChannelCommand,
    pub speech: ChannelCommand,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sounds: SoundsConfig::default(),
            player: ChannelCommand::default_player(),
            speech: ChannelCommand::default_speech(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./agent-notify.yaml
    /// 2. ~/.config/agent-notify/config.yaml
    /// 3. /etc/agent-notify/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("agent-notify.yaml")),
                dirs::home_dir().map(|h| h.join(".config/agent-notify/config.yaml")),
                Some(PathBuf::from("/etc/agent-notify/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match serde_yml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }
}

/// Resolved listen address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAddress {
    pub host: String,
    pub port: u16,
}

impl BindAddress {
    /// Parse `host:port` or a bare `port`. An empty host becomes `0.0.0.0`
    /// and an unparsable port becomes `8881`.
    pub fn parse(address: &str) -> Self {
        let (host, port) = match address.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => (DEFAULT_HOST, address),
        };
        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let port = port.trim().parse::<u16>().ok().filter(|p| *p != 0).unwrap_or(DEFAULT_PORT);
        Self {
            host: host.to_string(),
            port,
        }
    }
}

impl std::fmt::Display for BindAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
