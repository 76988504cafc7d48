//! Outline panel
//!
//! Shows the document's headings with the cursor's section highlighted. Document updates
//! arrive three ways: pushed `buffer_update`/`cursor_pos` messages, a rewritten context
//! snapshot (noticed by modification time), or a `request_outline` marker that reloads the
//! file from disk.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::Result;
use tracing::{debug, info};

use super::{Flow, Panel, Tone, View};
use crate::mailbox::{ContextWatcher, Mailbox, RequestKind};
use crate::outline::{DocumentOutline, ItemKind, OutlineParser, parser_for_path};
use crate::protocol::{Message, MessageKind};

pub struct OutlinePanel {
    path: PathBuf,
    mailbox: Mailbox,
    parser: Box<dyn OutlineParser>,
    watcher: ContextWatcher,
    lines: Vec<String>,
    cursor_line: usize,
    outline: Option<DocumentOutline>,
}

impl OutlinePanel {
    pub fn new(path: impl Into<PathBuf>, mailbox: Mailbox, parser: Box<dyn OutlineParser>) -> Self {
        let watcher = mailbox.context_watcher();
        let mut panel = Self {
            path: path.into(),
            mailbox,
            parser,
            watcher,
            lines: Vec::new(),
            cursor_line: 1,
            outline: None,
        };
        panel.reload_file();
        panel
    }

    pub fn outline(&self) -> Option<&DocumentOutline> {
        self.outline.as_ref()
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    /// Re-read the document from disk; a missing file keeps the current outline
    pub fn reload_file(&mut self) {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                info!(path = ?self.path, "OutlinePanel::reload_file: loaded");
                self.set_lines(content.split('\n').map(str::to_string).collect());
            }
            Err(e) => debug!(path = ?self.path, error = %e, "OutlinePanel::reload_file: not readable"),
        }
    }

    fn set_lines(&mut self, lines: Vec<String>) {
        self.outline = Some(self.parser.parse(&lines));
        self.lines = lines;
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl Panel for OutlinePanel {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn handle_message(&mut self, message: Message) -> Flow {
        match message.kind {
            MessageKind::BufferUpdate => match message.as_buffer_update() {
                Some(update) => {
                    debug!(lines = update.lines.len(), "OutlinePanel::handle_message: buffer update");
                    if let Some(line) = update.cursor_line {
                        self.cursor_line = line.max(1);
                    }
                    self.set_lines(update.lines);
                }
                None => debug!("OutlinePanel::handle_message: malformed buffer update"),
            },
            MessageKind::CursorPos => {
                if let Some(line) = message.as_cursor_line() {
                    self.cursor_line = line.max(1);
                }
            }
            MessageKind::ReqOutline => self.reload_file(),
            MessageKind::Shutdown => return Flow::Stop,
            kind => debug!(%kind, "OutlinePanel::handle_message: ignored"),
        }
        Flow::Continue
    }

    fn tick(&mut self) -> Result<()> {
        if self.watcher.changed()
            && let Some(snapshot) = self.mailbox.read_context()
        {
            debug!(cursor_line = snapshot.cursor_line, "OutlinePanel::tick: context changed");
            self.cursor_line = snapshot.cursor_line.max(1);
            self.set_lines(snapshot.lines);
        }

        if self.mailbox.poll_and_consume(RequestKind::Outline) {
            self.reload_file();
        }
        Ok(())
    }

    fn view(&self) -> View {
        let Some(outline) = &self.outline else {
            let mut view = View::new("Outline");
            view.push(Tone::Dim, "Loading...");
            return view;
        };

        let title = outline.title.clone().unwrap_or_else(|| self.file_name());
        let mut view = View::new(format!("Outline · {}", title));
        view.push(
            Tone::Dim,
            format!("{} words · {} lines", outline.word_count, outline.line_count),
        );
        view.blank();

        if outline.headings().next().is_none() {
            view.push(Tone::Dim, "(no headings)");
            view.push(Tone::Dim, "Add section headings, then fill them with:");
            view.push(Tone::Accent, "wr request fill-section --heading <H>");
            return view;
        }

        let current = outline.current_section(self.cursor_line);
        for item in &outline.items {
            match item.kind {
                ItemKind::Heading => {
                    let indent = "  ".repeat(item.level.saturating_sub(1));
                    let is_empty = outline.is_section_empty(item, &self.lines);
                    let marker = if is_empty { "◇" } else { "•" };
                    if current == Some(item) {
                        view.push(
                            Tone::Highlight,
                            format!("→ {}{} {} :{}", indent, marker, item.text, item.line_number),
                        );
                    } else {
                        let tone = if is_empty { Tone::Warning } else { Tone::Normal };
                        view.push(tone, format!("  {}{} {} :{}", indent, marker, item.text, item.line_number));
                    }
                }
                ItemKind::Code => {
                    view.push(Tone::Accent, format!("    {}", item.text));
                }
                ItemKind::Frontmatter => {}
            }
        }

        let empty = outline.empty_section_count(&self.lines);
        if empty > 0 {
            view.blank();
            view.push(Tone::Warning, format!("◇ {} empty section(s)", empty));
        }
        view
    }
}

/// Outline panel for `path`, parsing LaTeX or markdown by extension
pub fn outline_panel(path: &Path, mailbox: Mailbox) -> OutlinePanel {
    OutlinePanel::new(path, mailbox, parser_for_path(path))
}
