//! Static catalog of notification types: sound asset, glyph and console color.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Glyph used when logging a request whose type has no catalog entry.
pub const FALLBACK_GLYPH: &str = "📨";

/// ANSI reset sequence appended after a colored console line.
pub const RESET_COLOR: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationType {
    Question,
    Permission,
    Done,
    Error,
    Status,
    Waiting,
}

impl NotificationType {
    /// Every type with a catalog entry, in canonical order.
    pub const ALL: [NotificationType; 6] = [
        Self::Question,
        Self::Permission,
        Self::Done,
        Self::Error,
        Self::Status,
        Self::Waiting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Permission => "permission",
            Self::Done => "done",
            Self::Error => "error",
            Self::Status => "status",
            Self::Waiting => "waiting",
        }
    }

    pub fn glyph(self) -> &'static str {
        match self {
            Self::Question => "❓",
            Self::Permission => "🔐",
            Self::Done => "✅",
            Self::Error => "❌",
            Self::Status => "📡",
            Self::Waiting => "⏳",
        }
    }

    pub fn color_code(self) -> &'static str {
        match self {
            Self::Question => "\x1b[33m",   // yellow
            Self::Permission => "\x1b[35m", // magenta
            Self::Done => "\x1b[32m",       // green
            Self::Error => "\x1b[31m",      // red
            Self::Status => "\x1b[36m",     // cyan
            Self::Waiting => "\x1b[34m",    // blue
        }
    }

    pub fn sound_file(self) -> String {
        format!("{}.mp3", self.as_str())
    }

    /// Comma-separated list of all valid type names.
    pub fn valid_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownType;

/// Exact, case-sensitive parse.
impl FromStr for NotificationType {
    type Err = UnknownType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(UnknownType)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub kind: NotificationType,
    pub sound_asset: PathBuf,
    pub glyph: &'static str,
    pub color_code: &'static str,
}

/// Read-only lookup table built once at startup.
#[derive(Debug, Clone)]
pub struct SoundCatalog {
    entries: Vec<CatalogEntry>,
}

impl SoundCatalog {
    pub fn new(sounds_dir: &Path) -> Self {
        let entries = NotificationType::ALL
            .into_iter()
            .map(|kind| CatalogEntry {
                kind,
                sound_asset: sounds_dir.join(kind.sound_file()),
                glyph: kind.glyph(),
                color_code: kind.color_code(),
            })
            .collect();
        Self { entries }
    }

    pub fn lookup(&self, name: &str) -> Option<&CatalogEntry> {
        let kind: NotificationType = name.parse().ok()?;
        self.entries.iter().find(|e| e.kind == kind)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    /// Entries whose sound file is not present on disk.
    pub fn missing_assets(&self) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .filter(|e| !e.sound_asset.exists())
            .collect()
    }
}
