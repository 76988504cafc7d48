//! Canned generator used without a configured backend

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::{DocumentReview, GenerateError, Generator, SectionContent, Suggestion, WritingContext};
use crate::preview::PreviewMode;

const NEXT_PARAGRAPH: [(&str, f32, &str); 5] = [
    (
        "Building on this foundation, we can explore the practical implications. The approach outlined above provides a framework for understanding the key challenges and opportunities that lie ahead.",
        0.9,
        "Continue narrative",
    ),
    (
        "However, there are important considerations to keep in mind. Not all situations will benefit equally from this approach, and careful analysis is required before implementation.",
        0.7,
        "Add nuance",
    ),
    (
        "The evidence supports this conclusion from multiple angles. Research in related fields has consistently shown similar patterns, lending credibility to the overall thesis.",
        0.5,
        "Support argument",
    ),
    (
        "Consider a concrete example. When the same idea is applied to a small, familiar case, its strengths and limits become much easier to see.",
        0.4,
        "Add example",
    ),
    (
        "Taken together, these points suggest a clear direction for what follows, and set up the questions the next section has to answer.",
        0.3,
        "Transition",
    ),
];

const ALTERNATIVES: [(&str, f32, &str); 5] = [
    (
        "Here's an alternative way to express this idea, maintaining the core meaning while varying the structure and word choice for better flow.",
        0.9,
        "Clearer phrasing",
    ),
    (
        "This version takes a more direct approach, cutting unnecessary words while preserving the essential message and tone of the original.",
        0.7,
        "More concise",
    ),
    (
        "A more formal version of the same content, suitable for academic or professional contexts where precision is valued.",
        0.5,
        "Formal tone",
    ),
    (
        "A warmer, more conversational take on the same point that speaks to the reader directly.",
        0.4,
        "Conversational tone",
    ),
    (
        "The same idea, opening with its conclusion so the reader knows where the paragraph is going.",
        0.3,
        "Lead with the point",
    ),
];

/// Deterministic generator for tests and offline use
#[derive(Debug, Default)]
pub struct MockGenerator {
    calls: AtomicUsize,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of generation calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn suggest(&self, context: &WritingContext, count: usize) -> Result<Vec<Suggestion>, GenerateError> {
        debug!(%count, mode = %context.mode(), "MockGenerator::suggest: called");
        self.calls.fetch_add(1, Ordering::SeqCst);
        let canned = match context.mode() {
            PreviewMode::NextParagraph => &NEXT_PARAGRAPH,
            PreviewMode::Alternatives => &ALTERNATIVES,
        };
        Ok(canned
            .iter()
            .take(count)
            .map(|(text, confidence, description)| Suggestion::new(*text, *confidence, *description))
            .collect())
    }

    async fn fill_section(
        &self,
        _document: &str,
        heading: &str,
        _outline: &[String],
    ) -> Result<SectionContent, GenerateError> {
        debug!(%heading, "MockGenerator::fill_section: called");
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = format!(
            "This section covers {}.\n\n\
             The topic is important because it relates to the overall theme of the document. \
             There are several key points to consider when discussing this subject.\n\n\
             First, we should understand the foundational concepts. Second, we can explore the \
             practical applications. Finally, we'll examine the implications for the broader context.",
            heading.to_lowercase()
        );
        Ok(SectionContent {
            heading: heading.to_string(),
            content,
        })
    }

    async fn review(&self, _document: &str) -> Result<DocumentReview, GenerateError> {
        debug!("MockGenerator::review: called");
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(DocumentReview {
            critique: "The prose meanders in places. Tighten the opening and cut the hedging qualifiers.".to_string(),
            weaknesses: "The central argument rests on an assumption that's never defended.".to_string(),
            strengths: "The concrete examples are vivid and the closing pulls the threads together well.".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(current: &str) -> WritingContext {
        WritingContext {
            current_paragraph: current.to_string(),
            cursor_line: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_suggest_respects_count_and_mode() {
        let generator = MockGenerator::new();

        let alternatives = generator.suggest(&context("Some paragraph."), 3).await.unwrap();
        assert_eq!(alternatives.len(), 3);
        assert_eq!(alternatives[0].description, "Clearer phrasing");

        let next = generator.suggest(&context(""), 5).await.unwrap();
        assert_eq!(next.len(), 5);
        assert_eq!(next[0].description, "Continue narrative");

        assert_eq!(generator.call_count(), 2);
    }

    #[tokio::test]
    async fn test_fill_section_mentions_heading() {
        let generator = MockGenerator::new();
        let section = generator.fill_section("", "Related Work", &[]).await.unwrap();
        assert_eq!(section.heading, "Related Work");
        assert!(section.content.starts_with("This section covers related work."));
    }
}
