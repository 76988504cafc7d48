//! Editor-side link
//!
//! Everything the editing process does to talk to the panels: publish the context snapshot,
//! drop request and navigation markers, read results back, and push messages on the
//! channels.

use std::collections::HashMap;

use eyre::Result;
use tracing::{debug, info};

use crate::channel::{Channel, ChannelWriter, ensure_channels};
use crate::layout::{FILL_RESULT_FILE, REVIEW_RESULT_FILE, StateDir, SUGGESTION_MODE_FILE};
use crate::mailbox::{ContextSnapshot, FillSectionRequest, Mailbox, RequestKind};
use crate::panel::ReviewResult;
use crate::preview::{PreviewMode, PreviewSnapshot, read_snapshot};
use crate::protocol::{BufferUpdate, Message};

/// Result of accepting the previewed candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub text: String,
    pub mode: PreviewMode,
    /// Whether a reader was attached to `suggestions→editor`
    pub delivered: bool,
}

pub struct EditorLink {
    mailbox: Mailbox,
    writers: HashMap<Channel, ChannelWriter>,
}

impl EditorLink {
    pub fn new(dir: StateDir) -> Self {
        let writers = Channel::ALL
            .into_iter()
            .map(|channel| (channel, ChannelWriter::new(channel.path(&dir))))
            .collect();
        Self {
            mailbox: Mailbox::new(dir),
            writers,
        }
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Create the state directory and every channel
    pub fn ensure(&self) -> Result<()> {
        self.mailbox.dir().ensure()?;
        ensure_channels(self.mailbox.dir())
    }

    pub fn write_context(&self, context: &ContextSnapshot) -> Result<()> {
        self.mailbox.write_context(context)
    }

    pub fn request(&self, kind: RequestKind, context: Option<&ContextSnapshot>) -> Result<()> {
        info!(%kind, "EditorLink::request: called");
        self.mailbox.request(kind, context)
    }

    pub fn request_fill_section(&self, heading: &str, outline: Vec<String>) -> Result<()> {
        info!(%heading, "EditorLink::request_fill_section: called");
        let request = FillSectionRequest {
            heading: heading.to_string(),
            outline,
        };
        self.mailbox.request_with_payload(RequestKind::FillSection, &request)
    }

    pub fn preview_next(&self) -> Result<()> {
        self.mailbox.request(RequestKind::PreviewNext, None)
    }

    pub fn preview_prev(&self) -> Result<()> {
        self.mailbox.request(RequestKind::PreviewPrev, None)
    }

    /// Ask the suggestions panel to drop the previewed batch
    pub fn preview_clear(&self) -> Result<()> {
        self.mailbox.request(RequestKind::PreviewClear, None)
    }

    pub fn preview_state(&self) -> Option<PreviewSnapshot> {
        read_snapshot(&self.mailbox)
    }

    pub fn suggestion_mode(&self) -> Option<PreviewMode> {
        self.mailbox.read_text(SUGGESTION_MODE_FILE)?.parse().ok()
    }

    /// Text of candidate `n` (1-based)
    pub fn suggestion(&self, n: usize) -> Option<String> {
        std::fs::read_to_string(self.mailbox.dir().suggestion_file(n)).ok()
    }

    pub fn review_result(&self) -> Option<ReviewResult> {
        self.mailbox.read_json(REVIEW_RESULT_FILE)
    }

    pub fn fill_result(&self) -> Option<String> {
        self.mailbox.read_text(FILL_RESULT_FILE)
    }

    /// Push a message on `channel`; false when nobody is listening
    pub fn send(&self, channel: Channel, message: &Message) -> bool {
        match self.writers.get(&channel) {
            Some(writer) => writer.send_message(message),
            None => false,
        }
    }

    /// Push the whole buffer to the outline panel
    pub fn push_buffer(&self, context: &ContextSnapshot) -> bool {
        let update = BufferUpdate {
            lines: context.lines.clone(),
            cursor_line: Some(context.cursor_line),
            filename: Some(context.filename.clone()),
        };
        self.send(Channel::EditorToOutline, &Message::buffer_update(&update))
    }

    pub fn push_cursor(&self, line: usize) -> bool {
        self.send(Channel::EditorToOutline, &Message::cursor_pos(line))
    }

    /// Hand the previewed candidate back to the editor as `insert_text`
    pub fn accept(&self) -> Option<Accepted> {
        let snapshot = self.preview_state()?;
        if snapshot.count == 0 || snapshot.text.is_empty() {
            debug!("EditorLink::accept: nothing previewed");
            return None;
        }
        let delivered = self.send(Channel::SuggestionsToEditor, &Message::insert_text(&snapshot.text));
        info!(delivered, index = snapshot.index, "EditorLink::accept: sent");
        Some(Accepted {
            text: snapshot.text,
            mode: snapshot.mode,
            delivered,
        })
    }
}
