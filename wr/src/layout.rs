//! State directory layout
//!
//! Every file the editor and the panels exchange lives under one per-user root. The root is
//! a plain value built from [`Config`](crate::config::Config) and handed to each component,
//! so tests and parallel sessions can point at their own directory.
//!
//! ```text
//! <root>/
//! ├── fifo/
//! │   ├── editor_to_outline
//! │   ├── editor_to_suggestions
//! │   ├── outline_to_editor
//! │   └── suggestions_to_editor
//! ├── logs/
//! ├── context.json
//! ├── request_outline | request_suggestions | request_review | request_fill_section
//! ├── preview_next | preview_prev | preview_clear
//! ├── suggestion_<n>.txt
//! ├── preview_state.json
//! ├── suggestion_mode.txt
//! ├── review_result.json
//! └── fill_result.txt
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tracing::debug;

/// File name of the context snapshot
pub const CONTEXT_FILE: &str = "context.json";

/// File name of the combined preview state
pub const PREVIEW_STATE_FILE: &str = "preview_state.json";

/// File name of the raw preview mode
pub const SUGGESTION_MODE_FILE: &str = "suggestion_mode.txt";

/// File name of the last review
pub const REVIEW_RESULT_FILE: &str = "review_result.json";

/// File name of the last fill-section output
pub const FILL_RESULT_FILE: &str = "fill_result.txt";

/// Root of the shared state directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// Wrap an existing or future directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the root, `fifo/` and `logs/` directories if missing
    pub fn ensure(&self) -> Result<()> {
        debug!(root = ?self.root, "StateDir::ensure: called");
        fs::create_dir_all(self.fifo_dir()).context("Failed to create fifo directory")?;
        fs::create_dir_all(self.logs_dir()).context("Failed to create logs directory")?;
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fifo_dir(&self) -> PathBuf {
        self.root.join("fifo")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Path of any file directly under the root
    pub fn file(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn context_file(&self) -> PathBuf {
        self.file(CONTEXT_FILE)
    }

    pub fn preview_state_file(&self) -> PathBuf {
        self.file(PREVIEW_STATE_FILE)
    }

    pub fn suggestion_mode_file(&self) -> PathBuf {
        self.file(SUGGESTION_MODE_FILE)
    }

    pub fn review_result_file(&self) -> PathBuf {
        self.file(REVIEW_RESULT_FILE)
    }

    pub fn fill_result_file(&self) -> PathBuf {
        self.file(FILL_RESULT_FILE)
    }

    /// Raw text of candidate `n` (1-based)
    pub fn suggestion_file(&self, n: usize) -> PathBuf {
        self.file(&format!("{}{}{}", SUGGESTION_PREFIX, n, SUGGESTION_SUFFIX))
    }
}

const SUGGESTION_PREFIX: &str = "suggestion_";
const SUGGESTION_SUFFIX: &str = ".txt";

/// Candidate number encoded in a `suggestion_<n>.txt` file name
pub fn suggestion_number(name: &str) -> Option<usize> {
    name.strip_prefix(SUGGESTION_PREFIX)?
        .strip_suffix(SUGGESTION_SUFFIX)?
        .parse()
        .ok()
}
