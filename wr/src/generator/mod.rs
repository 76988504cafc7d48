//! Text generation collaborator
//!
//! Panels see generation as an opaque async function from a writing context to candidate
//! text. The built-in [`MockGenerator`] returns canned output; [`CommandGenerator`] hands the
//! request to an external program so any backend can be plugged in.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod command;
mod error;
mod mock;

pub use command::CommandGenerator;
pub use error::{GenerateError, MAX_ERROR_MESSAGE, truncate_message};
pub use mock::MockGenerator;

use crate::config::GeneratorConfig;
use crate::mailbox::ContextSnapshot;
use crate::preview::PreviewMode;

/// Generates suggestions, section content and reviews
///
/// Each call is independent; implementations keep no conversation state.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Up to `count` candidates for the context's paragraph
    async fn suggest(&self, context: &WritingContext, count: usize) -> Result<Vec<Suggestion>, GenerateError>;

    /// Body text for a section given its heading and the document outline
    async fn fill_section(
        &self,
        document: &str,
        heading: &str,
        outline: &[String],
    ) -> Result<SectionContent, GenerateError>;

    /// Critique of the whole document
    async fn review(&self, document: &str) -> Result<DocumentReview, GenerateError>;
}

/// Create the generator described by config
///
/// A configured command wins; otherwise the mock generator is used.
pub fn create_generator(config: &GeneratorConfig) -> Arc<dyn Generator> {
    match config.command.as_deref() {
        Some([program, args @ ..]) => {
            debug!(%program, "create_generator: using command generator");
            Arc::new(CommandGenerator::new(program.clone(), args.to_vec(), config.timeout()))
        }
        _ => {
            debug!("create_generator: using mock generator");
            Arc::new(MockGenerator::new())
        }
    }
}

/// One candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub text: String,
    /// 0.0 to 1.0
    #[serde(default)]
    pub confidence: f32,
    /// What this candidate changes
    #[serde(default)]
    pub description: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, confidence: f32, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionContent {
    pub heading: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReview {
    pub critique: String,
    pub weaknesses: String,
    pub strengths: String,
}

/// What a generator sees of the document around the cursor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingContext {
    pub full_document: String,
    pub current_paragraph: String,
    pub paragraph_before: String,
    pub paragraph_after: String,
    /// 1-based
    pub cursor_line: usize,
    pub filename: String,
    pub is_empty_line: bool,
}

impl WritingContext {
    pub fn from_snapshot(snapshot: &ContextSnapshot) -> Self {
        debug!(cursor_line = snapshot.cursor_line, "WritingContext::from_snapshot: called");
        let cursor_line = snapshot.cursor_line.max(1);
        let is_empty_line = snapshot
            .lines
            .get(cursor_line - 1)
            .is_none_or(|line| line.trim().is_empty());
        let (paragraph_before, current_paragraph, paragraph_after) =
            extract_paragraphs(&snapshot.lines, cursor_line);

        Self {
            full_document: snapshot.text(),
            current_paragraph,
            paragraph_before,
            paragraph_after,
            cursor_line,
            filename: snapshot.filename.clone(),
            is_empty_line,
        }
    }

    /// Continue after the cursor, or rewrite the paragraph under it
    pub fn mode(&self) -> PreviewMode {
        if self.is_empty_line || self.current_paragraph.trim().is_empty() {
            PreviewMode::NextParagraph
        } else {
            PreviewMode::Alternatives
        }
    }
}

/// A blank-line separated block, with 1-based inclusive line range
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    start: usize,
    end: usize,
    text: String,
}

fn split_paragraphs(lines: &[String]) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut start = 1;

    for (i, line) in lines.iter().enumerate() {
        let line_num = i + 1;
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(Paragraph {
                    start,
                    end: line_num - 1,
                    text: current.join("\n"),
                });
                current.clear();
            }
            start = line_num + 1;
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(Paragraph {
            start,
            end: lines.len(),
            text: current.join("\n"),
        });
    }
    paragraphs
}

/// Split into (paragraph before, paragraph at cursor, paragraph after)
///
/// With the cursor on a blank line the middle is empty and the neighbours are the nearest
/// paragraphs above and below.
pub fn extract_paragraphs(lines: &[String], cursor_line: usize) -> (String, String, String) {
    let paragraphs = split_paragraphs(lines);
    let text = |i: usize| paragraphs.get(i).map(|p| p.text.clone()).unwrap_or_default();

    if let Some(idx) = paragraphs
        .iter()
        .position(|p| p.start <= cursor_line && cursor_line <= p.end)
    {
        let before = if idx > 0 { text(idx - 1) } else { String::new() };
        return (before, text(idx), text(idx + 1));
    }

    let below = paragraphs.iter().position(|p| p.start > cursor_line);
    let above = match below {
        Some(0) => None,
        Some(i) => Some(i - 1),
        None => paragraphs.len().checked_sub(1),
    };
    (
        above.map(text).unwrap_or_default(),
        String::new(),
        below.map(text).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    const DOC: &str = "# Title\n\nFirst paragraph\ncontinues here.\n\nSecond paragraph.\n\n\nThird.";

    #[test]
    fn test_extract_paragraph_under_cursor() {
        let (before, current, after) = extract_paragraphs(&lines(DOC), 4);
        assert_eq!(before, "# Title");
        assert_eq!(current, "First paragraph\ncontinues here.");
        assert_eq!(after, "Second paragraph.");
    }

    #[test]
    fn test_extract_on_blank_line_uses_neighbours() {
        let (before, current, after) = extract_paragraphs(&lines(DOC), 7);
        assert_eq!(before, "Second paragraph.");
        assert_eq!(current, "");
        assert_eq!(after, "Third.");
    }

    #[test]
    fn test_extract_past_end() {
        let (before, current, after) = extract_paragraphs(&lines(DOC), 40);
        assert_eq!(before, "Third.");
        assert_eq!(current, "");
        assert_eq!(after, "");
    }

    #[test]
    fn test_extract_empty_document() {
        assert_eq!(
            extract_paragraphs(&[], 1),
            (String::new(), String::new(), String::new())
        );
    }

    #[test]
    fn test_mode_from_snapshot() {
        let on_text = ContextSnapshot::from_text(DOC, 3, "doc.md");
        let ctx = WritingContext::from_snapshot(&on_text);
        assert_eq!(ctx.mode(), PreviewMode::Alternatives);
        assert!(!ctx.is_empty_line);

        let on_blank = ContextSnapshot::from_text(DOC, 5, "doc.md");
        let ctx = WritingContext::from_snapshot(&on_blank);
        assert_eq!(ctx.mode(), PreviewMode::NextParagraph);
        assert_eq!(ctx.paragraph_before, "First paragraph\ncontinues here.");
        assert_eq!(ctx.filename, "doc.md");
    }

    #[tokio::test]
    async fn test_create_generator_without_command_is_mock() {
        let generator = create_generator(&GeneratorConfig::default());
        let review = generator.review("Some text.").await.unwrap();
        assert_eq!(review, MockGenerator::new().review("Some text.").await.unwrap());
    }
}
