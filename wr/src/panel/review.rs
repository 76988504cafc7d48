//! Review panel
//!
//! Critiques the whole document when a `request_review` marker appears and publishes the
//! result to `review_result.json`.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, TimeZone, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::{Flow, Panel, TaskStatus, Tone, View, lock};
use crate::generator::{DocumentReview, GenerateError, Generator};
use crate::layout::REVIEW_RESULT_FILE;
use crate::mailbox::{Mailbox, RequestKind};
use crate::protocol::{Message, MessageKind};

/// Published form of a review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewResult {
    pub critique: String,
    pub weaknesses: String,
    pub strengths: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl ReviewResult {
    pub fn new(review: DocumentReview, at: DateTime<Utc>) -> Self {
        Self {
            critique: review.critique,
            weaknesses: review.weaknesses,
            strengths: review.strengths,
            timestamp: at.timestamp_millis() as f64 / 1000.0,
        }
    }

    /// Local time the review was produced
    pub fn reviewed_at(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt((self.timestamp * 1000.0) as i64).single()
    }
}

#[derive(Debug, Default)]
pub struct ReviewState {
    pub review: Option<ReviewResult>,
    pub status: TaskStatus,
}

pub struct ReviewPanel {
    filename: String,
    mailbox: Mailbox,
    generator: Arc<dyn Generator>,
    state: Arc<Mutex<ReviewState>>,
}

impl ReviewPanel {
    /// Create the panel, showing the last published review if there is one
    pub fn new(filename: impl Into<String>, mailbox: Mailbox, generator: Arc<dyn Generator>) -> Self {
        let state = ReviewState {
            review: mailbox.read_json(REVIEW_RESULT_FILE),
            status: TaskStatus::default(),
        };
        Self {
            filename: filename.into(),
            mailbox,
            generator,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> Arc<Mutex<ReviewState>> {
        self.state.clone()
    }

    /// Start reviewing the current context in the background
    pub fn request_review(&self) {
        let task = lock(&self.state).status.begin();
        info!(task, "ReviewPanel::request_review: reviewing");

        let mailbox = self.mailbox.clone();
        let generator = self.generator.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let result = async {
                let snapshot = mailbox.read_context().ok_or(GenerateError::NoContext)?;
                if snapshot.is_blank() {
                    return Err(GenerateError::EmptyDocument);
                }
                let review = generator.review(&snapshot.text()).await?;
                Ok::<_, GenerateError>(ReviewResult::new(review, Utc::now()))
            }
            .await;

            let mut state = lock(&state);
            if !state.status.finish(task) {
                return;
            }
            match result {
                Ok(review) => {
                    if let Err(e) = mailbox.publish_json(REVIEW_RESULT_FILE, &review) {
                        error!(error = %e, "ReviewPanel: failed to publish review");
                        state.status.fail(&e.to_string());
                    }
                    state.review = Some(review);
                }
                Err(e) => {
                    error!(error = %e, "ReviewPanel: review failed");
                    state.status.fail(&e.to_string());
                }
            }
        });
    }
}

impl Panel for ReviewPanel {
    fn name(&self) -> &'static str {
        "review"
    }

    fn handle_message(&mut self, message: Message) -> Flow {
        match message.kind {
            MessageKind::Shutdown => Flow::Stop,
            kind => {
                debug!(%kind, "ReviewPanel::handle_message: ignored");
                Flow::Continue
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        if self.mailbox.poll_and_consume(RequestKind::Review) {
            self.request_review();
        }
        Ok(())
    }

    fn view(&self) -> View {
        let state = lock(&self.state);
        let mut view = View::new(format!("Review · {}", self.filename));

        if state.status.is_loading {
            view.push(Tone::Warning, "Analyzing...");
            view.push(Tone::Dim, "Reviewing prose and finding weaknesses.");
            return view;
        }

        if let Some(message) = &state.status.error_message {
            view.push(Tone::Error, "Error");
            view.push(Tone::Error, message.clone());
            view.blank();
            view.push(Tone::Dim, "Try again with: wr request review");
            return view;
        }

        let Some(review) = &state.review else {
            view.push(Tone::Dim, "No review yet");
            view.push(Tone::Dim, "Request with: wr request review");
            return view;
        };

        if !review.critique.is_empty() {
            view.push(Tone::Accent, "Critique");
            view.push(Tone::Normal, review.critique.clone());
            view.blank();
        }
        if !review.weaknesses.is_empty() {
            view.push(Tone::Error, "Weakness");
            view.push(Tone::Warning, review.weaknesses.clone());
            view.blank();
        }
        if !review.strengths.is_empty() {
            view.push(Tone::Highlight, "Strength");
            view.push(Tone::Normal, review.strengths.clone());
            view.blank();
        }
        if let Some(at) = review.reviewed_at() {
            view.push(Tone::Dim, format!("Reviewed {}", at.format("%H:%M:%S")));
        }
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;
    use crate::layout::StateDir;
    use crate::mailbox::ContextSnapshot;
    use std::time::Duration;
    use tempfile::TempDir;

    fn panel(temp: &TempDir) -> ReviewPanel {
        let dir = StateDir::new(temp.path());
        dir.ensure().unwrap();
        ReviewPanel::new("draft.md", Mailbox::new(dir), Arc::new(MockGenerator::new()))
    }

    async fn settle(panel: &ReviewPanel) {
        for _ in 0..100 {
            if !lock(&panel.state).status.is_loading {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("review did not finish");
    }

    #[tokio::test]
    async fn test_review_marker_publishes_result() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        let snapshot = ContextSnapshot::from_text("# Essay\n\nAn argument.", 3, "draft.md");
        panel.mailbox.request(RequestKind::Review, Some(&snapshot)).unwrap();

        let before = Utc::now().timestamp() as f64;
        panel.tick().unwrap();
        settle(&panel).await;

        let result: ReviewResult = panel.mailbox.read_json(REVIEW_RESULT_FILE).unwrap();
        assert!(result.weaknesses.contains("assumption"));
        assert!(result.timestamp >= before);
        assert!(panel.view().plain_text().contains("Critique"));

        // Pretty-printed for humans
        let raw = panel.mailbox.read_text(REVIEW_RESULT_FILE).unwrap();
        assert!(raw.contains("\n  \"critique\""));
    }

    #[tokio::test]
    async fn test_empty_document_is_error() {
        let temp = TempDir::new().unwrap();
        let panel = panel(&temp);
        panel
            .mailbox
            .write_context(&ContextSnapshot::from_text("\n  \n", 1, "draft.md"))
            .unwrap();

        panel.request_review();
        settle(&panel).await;

        assert_eq!(lock(&panel.state).status.error_message.as_deref(), Some("Document is empty"));
        assert!(panel.mailbox.read_text(REVIEW_RESULT_FILE).is_none());
    }

    #[tokio::test]
    async fn test_loads_previous_review_on_start() {
        let temp = TempDir::new().unwrap();
        let first = panel(&temp);
        let previous = ReviewResult {
            critique: "c".to_string(),
            weaknesses: "w".to_string(),
            strengths: "s".to_string(),
            timestamp: 1_700_000_000.5,
        };
        first.mailbox.publish_json(REVIEW_RESULT_FILE, &previous).unwrap();

        let second = panel(&temp);
        assert_eq!(lock(&second.state).review, Some(previous));
    }

    #[test]
    fn test_shutdown_stops() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        assert_eq!(panel.handle_message(Message::bare(MessageKind::ReqOutline)), Flow::Continue);
        assert_eq!(panel.handle_message(Message::shutdown()), Flow::Stop);
    }
}
