//! Push channels between the editor and the panels
//!
//! Each logical channel is a named pipe under `<state>/fifo/`. Pipes are created once per
//! session (idempotently, by whichever process gets there first) and never removed. Writers
//! are fire-and-forget: with no reader attached the bytes are dropped. Readers run a
//! [`Subscription`] that survives writers coming and going.

use std::fmt;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use eyre::{Result, eyre};
use nix::errno::Errno;
use nix::sys::stat::Mode;
use tracing::debug;

use crate::layout::StateDir;

pub mod endpoint;
pub mod subscription;

pub use endpoint::{ChannelReader, ChannelWriter, ReadOutcome};
pub use subscription::{LineBuffer, MessageHandler, Subscription, SubscriptionConfig};

/// The fixed set of channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    EditorToOutline,
    EditorToSuggestions,
    OutlineToEditor,
    SuggestionsToEditor,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::EditorToOutline,
        Channel::EditorToSuggestions,
        Channel::OutlineToEditor,
        Channel::SuggestionsToEditor,
    ];

    /// Name of the pipe under `fifo/`
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::EditorToOutline => "editor_to_outline",
            Self::EditorToSuggestions => "editor_to_suggestions",
            Self::OutlineToEditor => "outline_to_editor",
            Self::SuggestionsToEditor => "suggestions_to_editor",
        }
    }

    /// Human-facing name, e.g. `editor→outline`
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::EditorToOutline => "editor→outline",
            Self::EditorToSuggestions => "editor→suggestions",
            Self::OutlineToEditor => "outline→editor",
            Self::SuggestionsToEditor => "suggestions→editor",
        }
    }

    pub fn path(&self, dir: &StateDir) -> PathBuf {
        dir.fifo_dir().join(self.file_name())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Channel {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('→', "_to_").replace("->", "_to_").replace('-', "_");
        Channel::ALL
            .into_iter()
            .find(|c| c.file_name() == normalized)
            .ok_or_else(|| eyre!("Unknown channel: {}", s))
    }
}

/// Create the named pipe at `path` unless it already exists
///
/// Safe to call from several processes at once: losing the creation race is not an error.
pub fn ensure_channel(path: &Path) -> Result<()> {
    debug!(?path, "ensure_channel: called");
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Ok(meta) = fs::metadata(path) {
        if meta.file_type().is_fifo() {
            debug!(?path, "ensure_channel: already exists");
            return Ok(());
        }
        return Err(eyre!("{} exists and is not a named pipe", path.display()));
    }

    match nix::unistd::mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
        Ok(()) => {
            debug!(?path, "ensure_channel: created");
            Ok(())
        }
        Err(Errno::EEXIST) => {
            debug!(?path, "ensure_channel: created concurrently by another process");
            Ok(())
        }
        Err(e) => Err(eyre!("Failed to create named pipe {}: {}", path.display(), e)),
    }
}

/// Create every channel pipe for this state directory
pub fn ensure_channels(dir: &StateDir) -> Result<()> {
    debug!(root = ?dir.root(), "ensure_channels: called");
    for channel in Channel::ALL {
        ensure_channel(&channel.path(dir))?;
    }
    Ok(())
}
