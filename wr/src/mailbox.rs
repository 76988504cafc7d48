//! Shared-file mailbox
//!
//! Request/response coordination that works whether or not the peer is running. The editor
//! writes the context snapshot and drops marker files; a panel polls for markers, consumes
//! them by deleting, and publishes result files.
//!
//! Whoever's `unlink` succeeds owns the request, so each created marker is detected at most
//! once across every process polling the directory. Whole-file writes go through a temporary
//! sibling and a rename, so readers see either the old or the new content.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use eyre::{Context, Result, eyre};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::layout::StateDir;

/// One-shot actions signalled by a marker file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Outline,
    Suggestions,
    Review,
    FillSection,
    PreviewNext,
    PreviewPrev,
    PreviewClear,
}

impl RequestKind {
    pub const ALL: [RequestKind; 7] = [
        RequestKind::Outline,
        RequestKind::Suggestions,
        RequestKind::Review,
        RequestKind::FillSection,
        RequestKind::PreviewNext,
        RequestKind::PreviewPrev,
        RequestKind::PreviewClear,
    ];

    /// File name of the marker under the state root
    pub fn marker_name(&self) -> &'static str {
        match self {
            Self::Outline => "request_outline",
            Self::Suggestions => "request_suggestions",
            Self::Review => "request_review",
            Self::FillSection => "request_fill_section",
            Self::PreviewNext => "preview_next",
            Self::PreviewPrev => "preview_prev",
            Self::PreviewClear => "preview_clear",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker_name())
    }
}

impl FromStr for RequestKind {
    type Err = eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.replace('-', "_");
        RequestKind::ALL
            .into_iter()
            .find(|k| k.marker_name() == normalized || k.marker_name() == format!("request_{}", normalized))
            .ok_or_else(|| eyre!("Unknown request kind: {}", s))
    }
}

/// Latest known document state, written by the editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub lines: Vec<String>,
    /// 1-based
    #[serde(default = "default_cursor_line")]
    pub cursor_line: usize,
    #[serde(default)]
    pub filename: String,
}

fn default_cursor_line() -> usize {
    1
}

impl ContextSnapshot {
    /// Build a snapshot from whole-document text
    pub fn from_text(text: &str, cursor_line: usize, filename: impl Into<String>) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            cursor_line: cursor_line.max(1),
            filename: filename.into(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// True when every line is blank
    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

/// Payload of a `request_fill_section` marker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSectionRequest {
    pub heading: String,
    #[serde(default)]
    pub outline: Vec<String>,
}

/// Handle on the marker, context and result files of one state directory
#[derive(Debug, Clone)]
pub struct Mailbox {
    dir: StateDir,
}

impl Mailbox {
    pub fn new(dir: StateDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &StateDir {
        &self.dir
    }

    pub fn marker_path(&self, kind: RequestKind) -> PathBuf {
        self.dir.file(kind.marker_name())
    }

    /// Write the context snapshot (if given), then create the marker for `kind`
    pub fn request(&self, kind: RequestKind, context: Option<&ContextSnapshot>) -> Result<()> {
        debug!(%kind, with_context = context.is_some(), "Mailbox::request: called");
        if let Some(context) = context {
            self.write_context(context)?;
        }
        write_atomic(&self.marker_path(kind), b"")
            .context(format!("Failed to create marker {}", kind))
    }

    /// Create the marker for `kind` carrying a JSON payload
    pub fn request_with_payload<T: Serialize>(&self, kind: RequestKind, payload: &T) -> Result<()> {
        debug!(%kind, "Mailbox::request_with_payload: called");
        let body = serde_json::to_vec(payload).context("Failed to encode marker payload")?;
        write_atomic(&self.marker_path(kind), &body).context(format!("Failed to create marker {}", kind))
    }

    /// Whether a marker for `kind` currently exists
    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.marker_path(kind).exists()
    }

    /// Delete the marker for `kind` if present
    ///
    /// Returns true only when this call removed it; the caller then performs the action
    /// exactly once. A marker already gone is not an error.
    pub fn poll_and_consume(&self, kind: RequestKind) -> bool {
        let path = self.marker_path(kind);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(%kind, "Mailbox::poll_and_consume: consumed");
                true
            }
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(%kind, error = %e, "Mailbox::poll_and_consume: failed to remove marker");
                false
            }
        }
    }

    /// Consume the marker for `kind` and return its payload text
    ///
    /// The marker is claimed by renaming it first, so the payload returned is always the one
    /// belonging to the marker this call removed.
    pub fn consume_payload(&self, kind: RequestKind) -> Option<String> {
        let path = self.marker_path(kind);
        let claimed = temp_sibling(&path, "claimed");
        match fs::rename(&path, &claimed) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(%kind, error = %e, "Mailbox::consume_payload: failed to claim marker");
                return None;
            }
        }

        let body = fs::read_to_string(&claimed).unwrap_or_else(|e| {
            warn!(%kind, error = %e, "Mailbox::consume_payload: failed to read claimed marker");
            String::new()
        });
        if let Err(e) = fs::remove_file(&claimed) {
            debug!(%kind, error = %e, "Mailbox::consume_payload: failed to remove claimed marker");
        }
        debug!(%kind, len = body.len(), "Mailbox::consume_payload: consumed");
        Some(body)
    }

    /// Overwrite the context snapshot
    pub fn write_context(&self, context: &ContextSnapshot) -> Result<()> {
        debug!(lines = context.lines.len(), cursor_line = context.cursor_line, "Mailbox::write_context: called");
        self.publish_json(crate::layout::CONTEXT_FILE, context)
    }

    /// Read the context snapshot; missing or unparsable means no update
    pub fn read_context(&self) -> Option<ContextSnapshot> {
        self.read_json(crate::layout::CONTEXT_FILE)
    }

    /// Serialize `value` to `name` under the root, replacing any previous content
    pub fn publish_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value).context(format!("Failed to encode {}", name))?;
        write_atomic(&self.dir.file(name), &body).context(format!("Failed to write {}", name))
    }

    /// Write raw text to `name` under the root, replacing any previous content
    pub fn publish_text(&self, name: &str, text: &str) -> Result<()> {
        write_atomic(&self.dir.file(name), text.as_bytes()).context(format!("Failed to write {}", name))
    }

    /// Parse a JSON file under the root
    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.file(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                debug!(?path, error = %e, "Mailbox::read_json: read failed");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(?path, error = %e, "Mailbox::read_json: unparsable, ignoring");
                None
            }
        }
    }

    /// Read a text file under the root
    pub fn read_text(&self, name: &str) -> Option<String> {
        fs::read_to_string(self.dir.file(name)).ok()
    }

    /// Watcher on the context snapshot's modification time
    pub fn context_watcher(&self) -> ContextWatcher {
        ContextWatcher::new(self.dir.context_file())
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_sibling(path: &Path, tag: &str) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.{}", name, std::process::id(), n, tag))
}

/// Replace `path` with `contents` in one rename
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path, "tmp");
    fs::write(&tmp, contents).context(format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).context(format!("Failed to replace {}", path.display()));
    }
    Ok(())
}

/// Detects context snapshot changes by modification time
#[derive(Debug)]
pub struct ContextWatcher {
    path: PathBuf,
    last_seen: Option<SystemTime>,
}

impl ContextWatcher {
    pub fn new(path: PathBuf) -> Self {
        Self { path, last_seen: None }
    }

    /// True when the file exists and its mtime differs from the last call that returned true
    pub fn changed(&mut self) -> bool {
        let modified = match fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        if self.last_seen == Some(modified) {
            return false;
        }
        debug!(path = ?self.path, "ContextWatcher::changed: modification time moved");
        self.last_seen = Some(modified);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn mailbox(temp: &TempDir) -> Mailbox {
        let dir = StateDir::new(temp.path());
        dir.ensure().unwrap();
        Mailbox::new(dir)
    }

    fn snapshot() -> ContextSnapshot {
        ContextSnapshot {
            lines: vec!["# Title".to_string(), "".to_string(), "Body text".to_string()],
            cursor_line: 2,
            filename: "draft.md".to_string(),
        }
    }

    #[test]
    fn test_request_kind_parsing() {
        assert_eq!("suggestions".parse::<RequestKind>().unwrap(), RequestKind::Suggestions);
        assert_eq!("fill-section".parse::<RequestKind>().unwrap(), RequestKind::FillSection);
        assert_eq!("request_review".parse::<RequestKind>().unwrap(), RequestKind::Review);
        assert_eq!("preview_next".parse::<RequestKind>().unwrap(), RequestKind::PreviewNext);
        assert!("nonsense".parse::<RequestKind>().is_err());
    }

    #[test]
    fn test_request_writes_context_then_marker() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);

        mb.request(RequestKind::Suggestions, Some(&snapshot())).unwrap();

        assert!(mb.is_pending(RequestKind::Suggestions));
        assert_eq!(mb.read_context(), Some(snapshot()));
    }

    #[test]
    fn test_poll_and_consume_once() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);

        assert!(!mb.poll_and_consume(RequestKind::Review));
        mb.request(RequestKind::Review, None).unwrap();
        assert!(mb.poll_and_consume(RequestKind::Review));
        assert!(!mb.poll_and_consume(RequestKind::Review));
        assert!(!mb.marker_path(RequestKind::Review).exists());
    }

    #[test]
    fn test_back_to_back_requests_detected_exactly_once() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);

        // Two producers create the same marker before anyone polls
        mb.request(RequestKind::Suggestions, None).unwrap();
        mb.request(RequestKind::Suggestions, None).unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let detected = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mb = mb.clone();
                let barrier = barrier.clone();
                let detected = detected.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if mb.poll_and_consume(RequestKind::Suggestions) {
                        detected.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(detected.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_consume_payload_exactly_once() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);
        let request = FillSectionRequest {
            heading: "Methods".to_string(),
            outline: vec!["Setup".to_string(), "Results".to_string()],
        };
        mb.request_with_payload(RequestKind::FillSection, &request).unwrap();

        let barrier = Arc::new(Barrier::new(4));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mb = mb.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    mb.consume_payload(RequestKind::FillSection)
                })
            })
            .collect();
        let payloads: Vec<String> = handles.into_iter().filter_map(|h| h.join().unwrap()).collect();

        assert_eq!(payloads.len(), 1);
        let parsed: FillSectionRequest = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(parsed, request);

        // No claimed leftovers
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_context_tolerates_missing_and_garbage() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);

        assert_eq!(mb.read_context(), None);
        fs::write(mb.dir().context_file(), "{\"lines\": [").unwrap();
        assert_eq!(mb.read_context(), None);
    }

    #[test]
    fn test_context_defaults_cursor_line() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);
        fs::write(mb.dir().context_file(), r#"{"lines": ["a"]}"#).unwrap();

        let ctx = mb.read_context().unwrap();
        assert_eq!(ctx.cursor_line, 1);
        assert_eq!(ctx.filename, "");
    }

    #[test]
    fn test_publish_overwrites_wholesale() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);

        mb.publish_text("fill_result.txt", "a much longer first result").unwrap();
        mb.publish_text("fill_result.txt", "short").unwrap();
        assert_eq!(mb.read_text("fill_result.txt").as_deref(), Some("short"));
    }

    #[test]
    fn test_context_watcher_detects_rewrite() {
        let temp = TempDir::new().unwrap();
        let mb = mailbox(&temp);
        let mut watcher = mb.context_watcher();

        assert!(!watcher.changed());
        mb.write_context(&snapshot()).unwrap();
        assert!(watcher.changed());
        assert!(!watcher.changed());

        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut updated = snapshot();
        updated.cursor_line = 3;
        mb.write_context(&updated).unwrap();
        assert!(watcher.changed());
    }

    #[test]
    fn test_snapshot_from_text() {
        let ctx = ContextSnapshot::from_text("one\n\nthree\n", 0, "x.md");
        assert_eq!(ctx.lines, vec!["one", "", "three"]);
        assert_eq!(ctx.cursor_line, 1);
        assert_eq!(ctx.text(), "one\n\nthree");
        assert!(!ctx.is_blank());
    }
}
