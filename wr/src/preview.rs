//! Preview state machine
//!
//! Tracks which candidate of the latest batch the editor is previewing. Every transition
//! that changes state is published to `preview_state.json` (plus `suggestion_mode.txt`) so the
//! editor can show the previewed text without knowing anything about the panel.

use std::fmt;
use std::fs;
use std::str::FromStr;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::layout::{PREVIEW_STATE_FILE, suggestion_number};
use crate::mailbox::{Mailbox, write_atomic};

/// What a batch of candidates is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewMode {
    /// Replacements for the paragraph under the cursor
    #[default]
    Alternatives,
    /// A new paragraph to insert after the cursor
    NextParagraph,
}

impl PreviewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alternatives => "alternatives",
            Self::NextParagraph => "next_paragraph",
        }
    }
}

impl fmt::Display for PreviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreviewMode {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "alternatives" => Ok(Self::Alternatives),
            "next_paragraph" => Ok(Self::NextParagraph),
            other => Err(eyre!("Unknown preview mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Empty,
    Active { index: usize, count: usize },
}

/// Published form of the preview state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSnapshot {
    pub index: usize,
    pub count: usize,
    pub text: String,
    pub mode: PreviewMode,
}

/// Preview state owned by one panel process
#[derive(Debug)]
pub struct PreviewMachine {
    mailbox: Mailbox,
    candidates: Vec<String>,
    mode: PreviewMode,
    state: PreviewState,
}

impl PreviewMachine {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox,
            candidates: Vec::new(),
            mode: PreviewMode::default(),
            state: PreviewState::Empty,
        }
    }

    pub fn state(&self) -> PreviewState {
        self.state
    }

    pub fn mode(&self) -> PreviewMode {
        self.mode
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            PreviewState::Active { index, count } if count > 0 => Some(index),
            _ => None,
        }
    }

    /// Text of the candidate being previewed
    pub fn current(&self) -> Option<&str> {
        self.index().and_then(|i| self.candidates.get(i)).map(String::as_str)
    }

    pub fn snapshot(&self) -> PreviewSnapshot {
        let (index, count) = match self.state {
            PreviewState::Empty => (0, 0),
            PreviewState::Active { index, count } => (index, count),
        };
        PreviewSnapshot {
            index,
            count,
            text: self.current().unwrap_or_default().to_string(),
            mode: self.mode,
        }
    }

    /// Replace the batch and preview its first candidate
    pub fn load(&mut self, candidates: Vec<String>, mode: PreviewMode) -> Result<()> {
        info!(count = candidates.len(), %mode, "PreviewMachine::load: new batch");
        self.state = PreviewState::Active {
            index: 0,
            count: candidates.len(),
        };
        self.candidates = candidates;
        self.mode = mode;

        let dir = self.mailbox.dir();
        for (i, text) in self.candidates.iter().enumerate() {
            let path = dir.suggestion_file(i + 1);
            write_atomic(&path, text.as_bytes()).context(format!("Failed to write candidate {}", i + 1))?;
        }
        self.remove_stale_candidates();
        self.publish()
    }

    /// Preview the next candidate, wrapping around
    ///
    /// Returns false (and publishes nothing) when there is nothing to navigate.
    pub fn advance(&mut self) -> Result<bool> {
        match self.state {
            PreviewState::Active { index, count } if count > 0 => {
                self.state = PreviewState::Active {
                    index: (index + 1) % count,
                    count,
                };
                debug!(state = ?self.state, "PreviewMachine::advance: moved");
                self.publish()?;
                Ok(true)
            }
            _ => {
                debug!("PreviewMachine::advance: nothing to preview");
                Ok(false)
            }
        }
    }

    /// Preview the previous candidate, wrapping around
    pub fn retreat(&mut self) -> Result<bool> {
        match self.state {
            PreviewState::Active { index, count } if count > 0 => {
                self.state = PreviewState::Active {
                    index: (index + count - 1) % count,
                    count,
                };
                debug!(state = ?self.state, "PreviewMachine::retreat: moved");
                self.publish()?;
                Ok(true)
            }
            _ => {
                debug!("PreviewMachine::retreat: nothing to preview");
                Ok(false)
            }
        }
    }

    /// Drop the batch
    pub fn clear(&mut self) -> Result<()> {
        debug!("PreviewMachine::clear: called");
        self.state = PreviewState::Empty;
        self.candidates.clear();
        self.remove_stale_candidates();
        self.publish()
    }

    fn publish(&self) -> Result<()> {
        self.mailbox.publish_json(PREVIEW_STATE_FILE, &self.snapshot())?;
        write_atomic(&self.mailbox.dir().suggestion_mode_file(), self.mode.as_str().as_bytes())
            .context("Failed to write suggestion mode")
    }

    /// Remove `suggestion_<n>.txt` files left over from a larger batch
    fn remove_stale_candidates(&self) {
        let entries = match fs::read_dir(self.mailbox.dir().root()) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "PreviewMachine::remove_stale_candidates: cannot list state dir");
                return;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(n) = name.to_str().and_then(suggestion_number) else {
                continue;
            };
            if n == 0 || n > self.candidates.len() {
                debug!(n, "PreviewMachine::remove_stale_candidates: removing");
                let _ = fs::remove_file(entry.path());
            }
        }
    }
}

/// Read the published preview state; missing or unparsable means none
pub fn read_snapshot(mailbox: &Mailbox) -> Option<PreviewSnapshot> {
    mailbox.read_json(PREVIEW_STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::StateDir;
    use tempfile::TempDir;

    fn machine(temp: &TempDir) -> PreviewMachine {
        let dir = StateDir::new(temp.path());
        dir.ensure().unwrap();
        PreviewMachine::new(Mailbox::new(dir))
    }

    fn three() -> Vec<String> {
        vec!["first".to_string(), "second".to_string(), "third".to_string()]
    }

    #[test]
    fn test_load_starts_at_zero_and_persists() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);

        m.load(three(), PreviewMode::Alternatives).unwrap();

        assert_eq!(m.state(), PreviewState::Active { index: 0, count: 3 });
        for (i, text) in three().iter().enumerate() {
            let path = temp.path().join(format!("suggestion_{}.txt", i + 1));
            assert_eq!(&fs::read_to_string(path).unwrap(), text);
        }
        let snap = read_snapshot(&m.mailbox).unwrap();
        assert_eq!(snap.index, 0);
        assert_eq!(snap.count, 3);
        assert_eq!(snap.text, "first");
        assert_eq!(
            fs::read_to_string(temp.path().join("suggestion_mode.txt")).unwrap(),
            "alternatives"
        );
    }

    #[test]
    fn test_advance_is_cyclic() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        m.load(three(), PreviewMode::Alternatives).unwrap();

        for _ in 0..3 {
            assert!(m.advance().unwrap());
        }
        assert_eq!(m.index(), Some(0));

        m.advance().unwrap();
        assert_eq!(read_snapshot(&m.mailbox).unwrap().text, "second");
    }

    #[test]
    fn test_retreat_wraps_to_last() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        m.load(three(), PreviewMode::NextParagraph).unwrap();

        assert!(m.retreat().unwrap());
        assert_eq!(m.state(), PreviewState::Active { index: 2, count: 3 });
        let snap = read_snapshot(&m.mailbox).unwrap();
        assert_eq!(snap.text, "third");
        assert_eq!(snap.mode, PreviewMode::NextParagraph);
    }

    #[test]
    fn test_empty_batch_ignores_navigation() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        m.load(Vec::new(), PreviewMode::Alternatives).unwrap();

        let state_file = temp.path().join("preview_state.json");
        fs::remove_file(&state_file).unwrap();

        assert!(!m.advance().unwrap());
        assert!(!m.retreat().unwrap());
        assert_eq!(m.state(), PreviewState::Active { index: 0, count: 0 });
        assert_eq!(m.current(), None);
        // Navigation on an empty batch does not rewrite the state file
        assert!(!state_file.exists());
    }

    #[test]
    fn test_navigation_before_any_load_is_noop() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        assert!(!m.advance().unwrap());
        assert_eq!(m.state(), PreviewState::Empty);
    }

    #[test]
    fn test_smaller_batch_removes_stale_files() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        m.load(three(), PreviewMode::Alternatives).unwrap();
        m.load(vec!["only".to_string()], PreviewMode::Alternatives).unwrap();

        assert!(temp.path().join("suggestion_1.txt").exists());
        assert!(!temp.path().join("suggestion_2.txt").exists());
        assert!(!temp.path().join("suggestion_3.txt").exists());
    }

    #[test]
    fn test_files_follow_state_dir_layout() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        let dir = m.mailbox.dir().clone();
        fs::write(temp.path().join("suggestion_notes.txt"), "keep").unwrap();

        m.load(three(), PreviewMode::NextParagraph).unwrap();
        assert_eq!(fs::read_to_string(dir.suggestion_file(2)).unwrap(), "second");
        assert_eq!(fs::read_to_string(dir.suggestion_mode_file()).unwrap(), "next_paragraph");

        m.clear().unwrap();
        assert!(!dir.suggestion_file(1).exists());
        assert!(dir.suggestion_mode_file().exists());
        assert!(temp.path().join("suggestion_notes.txt").exists());
    }

    #[test]
    fn test_clear_publishes_empty_state() {
        let temp = TempDir::new().unwrap();
        let mut m = machine(&temp);
        m.load(three(), PreviewMode::Alternatives).unwrap();
        m.advance().unwrap();

        m.clear().unwrap();

        assert_eq!(m.state(), PreviewState::Empty);
        let snap = read_snapshot(&m.mailbox).unwrap();
        assert_eq!(snap, PreviewSnapshot::default());
        assert!(!temp.path().join("suggestion_1.txt").exists());
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("next_paragraph".parse::<PreviewMode>().unwrap(), PreviewMode::NextParagraph);
        assert_eq!("alternatives\n".parse::<PreviewMode>().unwrap(), PreviewMode::Alternatives);
        assert!("other".parse::<PreviewMode>().is_err());
    }
}
