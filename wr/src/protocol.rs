//! Message envelope for channel traffic
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON
//! `{"type": "...", "data": ...}` followed by `\n`; `data` is omitted when absent.
//!
//! Encoding is strict, decoding is lenient: a line that is not a JSON object decodes to
//! a `raw` message carrying the original text, so a reader fed half a line keeps running.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full buffer content (editor → panel)
    BufferUpdate,
    /// Cursor line/col (editor → panel)
    CursorPos,
    /// User requested suggestions (editor → panel)
    ReqSuggestions,
    /// User requested outline refresh (editor → panel)
    ReqOutline,
    /// Jump to a line (panel → editor)
    JumpLine,
    /// Insert text at the cursor (panel → editor)
    InsertText,
    /// Stop the receiving process
    Shutdown,
    /// Undecodable line; data holds the original text
    Raw,
    /// Any other tag, kept verbatim
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::BufferUpdate => "buffer_update",
            Self::CursorPos => "cursor_pos",
            Self::ReqSuggestions => "req_suggestions",
            Self::ReqOutline => "req_outline",
            Self::JumpLine => "jump_line",
            Self::InsertText => "insert_text",
            Self::Shutdown => "shutdown",
            Self::Raw => "raw",
            Self::Other(tag) => tag,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "buffer_update" => Self::BufferUpdate,
            "cursor_pos" => Self::CursorPos,
            "req_suggestions" => Self::ReqSuggestions,
            "req_outline" => Self::ReqOutline,
            "jump_line" => Self::JumpLine,
            "insert_text" => Self::InsertText,
            "shutdown" => Self::Shutdown,
            "raw" => Self::Raw,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded record
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub data: Option<Value>,
}

impl Message {
    pub fn new(kind: MessageKind, data: Option<Value>) -> Self {
        Self { kind, data }
    }

    /// Message without a payload
    pub fn bare(kind: MessageKind) -> Self {
        Self { kind, data: None }
    }

    pub fn buffer_update(update: &BufferUpdate) -> Self {
        Self::new(MessageKind::BufferUpdate, serde_json::to_value(update).ok())
    }

    pub fn cursor_pos(line: usize) -> Self {
        Self::new(MessageKind::CursorPos, Some(serde_json::json!({ "line": line })))
    }

    pub fn jump_line(line: usize) -> Self {
        Self::new(MessageKind::JumpLine, Some(Value::from(line)))
    }

    pub fn insert_text(text: &str) -> Self {
        Self::new(MessageKind::InsertText, Some(Value::from(text)))
    }

    pub fn shutdown() -> Self {
        Self::bare(MessageKind::Shutdown)
    }

    /// Encode as one JSON line, without the trailing newline
    pub fn encode(&self) -> String {
        encode(&self.kind, self.data.as_ref())
    }

    /// Payload of a `buffer_update`, if well formed
    pub fn as_buffer_update(&self) -> Option<BufferUpdate> {
        self.data.clone().and_then(|v| serde_json::from_value(v).ok())
    }

    /// Line carried by `cursor_pos` (`{"line": n}` or a bare integer)
    pub fn as_cursor_line(&self) -> Option<usize> {
        match self.data.as_ref()? {
            Value::Object(map) => map.get("line").and_then(Value::as_u64).map(|n| n as usize),
            other => other.as_u64().map(|n| n as usize),
        }
    }

    /// Text carried by `insert_text` or `raw`
    pub fn as_text(&self) -> Option<&str> {
        self.data.as_ref().and_then(Value::as_str)
    }
}

/// Payload of a `buffer_update` message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferUpdate {
    pub lines: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Encode a message as one JSON line
///
/// The `data` key is left out when there is no payload (`None` or JSON `null`).
pub fn encode(kind: &MessageKind, data: Option<&Value>) -> String {
    let tag = Value::from(kind.as_str());
    match data.filter(|d| !d.is_null()) {
        Some(data) => format!(r#"{{"type":{},"data":{}}}"#, tag, data),
        None => format!(r#"{{"type":{}}}"#, tag),
    }
}

/// Decode one line; never fails
pub fn decode(line: &str) -> Message {
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(mut map)) => {
            let kind = match map.get("type").and_then(Value::as_str) {
                Some(tag) => MessageKind::from_tag(tag),
                None => MessageKind::Other("unknown".to_string()),
            };
            let data = map.remove("data").filter(|d| !d.is_null());
            Message { kind, data }
        }
        _ => Message::new(MessageKind::Raw, Some(Value::from(line))),
    }
}
