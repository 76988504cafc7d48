//! Suggestions panel
//!
//! Generates candidates for the paragraph under the cursor when asked (marker or pushed
//! `req_suggestions`), fills sections on request, and lets the editor cycle the preview with
//! navigation markers.

use std::sync::{Arc, Mutex};

use eyre::Result;
use tracing::{debug, error, info};

use super::render::clip;
use super::{Flow, Panel, TaskStatus, Tone, View, lock};
use crate::generator::{GenerateError, Generator, WritingContext};
use crate::layout::FILL_RESULT_FILE;
use crate::mailbox::{FillSectionRequest, Mailbox, RequestKind};
use crate::preview::{PreviewMachine, PreviewMode};
use crate::protocol::{Message, MessageKind};

/// State shared between the control loop and generation tasks
#[derive(Debug)]
pub struct SuggestionsState {
    pub preview: PreviewMachine,
    pub descriptions: Vec<String>,
    /// Paragraph the batch was generated for
    pub source: String,
    pub status: TaskStatus,
}

pub struct SuggestionsPanel {
    filename: String,
    mailbox: Mailbox,
    generator: Arc<dyn Generator>,
    count: usize,
    state: Arc<Mutex<SuggestionsState>>,
}

impl SuggestionsPanel {
    pub fn new(filename: impl Into<String>, mailbox: Mailbox, generator: Arc<dyn Generator>, count: usize) -> Self {
        let state = SuggestionsState {
            preview: PreviewMachine::new(mailbox.clone()),
            descriptions: Vec::new(),
            source: String::new(),
            status: TaskStatus::default(),
        };
        Self {
            filename: filename.into(),
            mailbox,
            generator,
            count,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Shared state, for inspection
    pub fn state(&self) -> Arc<Mutex<SuggestionsState>> {
        self.state.clone()
    }

    /// Start generating candidates in the background
    pub fn request_suggestions(&self) {
        let task = lock(&self.state).status.begin();
        info!(task, "SuggestionsPanel::request_suggestions: generating");

        let mailbox = self.mailbox.clone();
        let generator = self.generator.clone();
        let state = self.state.clone();
        let count = self.count;

        tokio::spawn(async move {
            let result = async {
                let snapshot = mailbox.read_context().ok_or(GenerateError::NoContext)?;
                let context = WritingContext::from_snapshot(&snapshot);
                let suggestions = generator.suggest(&context, count).await?;
                Ok::<_, GenerateError>((context, suggestions))
            }
            .await;

            let mut state = lock(&state);
            if !state.status.finish(task) {
                return;
            }
            match result {
                Ok((context, suggestions)) => {
                    let mode = context.mode();
                    state.source = match mode {
                        PreviewMode::NextParagraph => context.paragraph_before,
                        PreviewMode::Alternatives => context.current_paragraph,
                    };
                    state.descriptions = suggestions.iter().map(|s| s.description.clone()).collect();
                    let texts = suggestions.into_iter().map(|s| s.text).collect();
                    if let Err(e) = state.preview.load(texts, mode) {
                        error!(error = %e, "SuggestionsPanel: failed to publish suggestions");
                        state.status.fail(&e.to_string());
                    }
                }
                Err(e) => {
                    error!(error = %e, "SuggestionsPanel: generation failed");
                    state.status.fail(&e.to_string());
                }
            }
        });
    }

    /// Start filling a section in the background from a marker payload
    pub fn request_fill_section(&self, payload: &str) {
        let task = lock(&self.state).status.begin();
        info!(task, "SuggestionsPanel::request_fill_section: filling");

        let request = serde_json::from_str::<FillSectionRequest>(payload);
        let mailbox = self.mailbox.clone();
        let generator = self.generator.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            let result = async {
                let request: FillSectionRequest = request?;
                if request.heading.trim().is_empty() {
                    return Err(GenerateError::InvalidResponse("No section heading provided".to_string()));
                }
                let document = mailbox.read_context().map(|c| c.text()).unwrap_or_default();
                let section = generator
                    .fill_section(&document, &request.heading, &request.outline)
                    .await?;
                Ok::<_, GenerateError>(section)
            }
            .await;

            let mut state = lock(&state);
            if !state.status.finish(task) {
                return;
            }
            match result {
                Ok(section) => {
                    let published = mailbox
                        .publish_text(FILL_RESULT_FILE, &section.content)
                        .and_then(|_| state.preview.load(vec![section.content], PreviewMode::NextParagraph));
                    match published {
                        Ok(()) => {
                            state.descriptions = vec![format!("Content for: {}", section.heading)];
                            state.source = format!("Section: {}", section.heading);
                        }
                        Err(e) => {
                            error!(error = %e, "SuggestionsPanel: failed to publish section");
                            state.status.fail(&e.to_string());
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "SuggestionsPanel: fill section failed");
                    state.status.fail(&e.to_string());
                }
            }
        });
    }
}

impl Panel for SuggestionsPanel {
    fn name(&self) -> &'static str {
        "suggestions"
    }

    fn handle_message(&mut self, message: Message) -> Flow {
        match message.kind {
            MessageKind::ReqSuggestions => {
                self.request_suggestions();
                Flow::Continue
            }
            MessageKind::Shutdown => Flow::Stop,
            kind => {
                debug!(%kind, "SuggestionsPanel::handle_message: ignored");
                Flow::Continue
            }
        }
    }

    fn tick(&mut self) -> Result<()> {
        if self.mailbox.poll_and_consume(RequestKind::Suggestions) {
            self.request_suggestions();
        }

        if let Some(payload) = self.mailbox.consume_payload(RequestKind::FillSection) {
            self.request_fill_section(&payload);
        }

        if self.mailbox.poll_and_consume(RequestKind::PreviewNext) {
            lock(&self.state).preview.advance()?;
        }
        if self.mailbox.poll_and_consume(RequestKind::PreviewPrev) {
            lock(&self.state).preview.retreat()?;
        }
        if self.mailbox.poll_and_consume(RequestKind::PreviewClear) {
            lock(&self.state).preview.clear()?;
        }
        Ok(())
    }

    fn view(&self) -> View {
        let state = lock(&self.state);
        let mut view = View::new(format!("Suggestions · {}", self.filename));

        if state.status.is_loading {
            view.push(Tone::Accent, "Generating...");
            return view;
        }
        if let Some(message) = &state.status.error_message {
            view.push(Tone::Error, format!("Error: {}", message));
            view.blank();
        }

        let candidates = state.preview.candidates();
        if candidates.is_empty() {
            view.push(Tone::Dim, "No suggestions yet");
            view.push(Tone::Dim, "Request with: wr request suggestions");
            return view;
        }

        let mode = state.preview.mode();
        view.push(Tone::Dim, format!("Mode: {}", mode));
        if !state.source.is_empty() {
            let label = match mode {
                PreviewMode::Alternatives => "Rewriting",
                PreviewMode::NextParagraph => "After",
            };
            view.push(Tone::Dim, format!("{}: {}", label, clip(&state.source, 50)));
        }
        view.blank();

        let previewing = state.preview.index();
        for (i, text) in candidates.iter().enumerate() {
            let description = state.descriptions.get(i).map(String::as_str).unwrap_or("");
            if previewing == Some(i) {
                view.push(Tone::Highlight, format!("[{}] {} (previewing)", i + 1, description));
                view.push(Tone::Highlight, clip(text, 120));
            } else {
                view.push(Tone::Accent, format!("[{}] {}", i + 1, description));
                view.push(Tone::Normal, clip(text, 120));
            }
            view.blank();
        }

        view.push(Tone::Dim, "wr preview next|prev · wr accept");
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;
    use crate::layout::StateDir;
    use crate::mailbox::ContextSnapshot;
    use crate::preview::{PreviewState, read_snapshot};
    use std::time::Duration;
    use tempfile::TempDir;

    fn panel(temp: &TempDir) -> SuggestionsPanel {
        let dir = StateDir::new(temp.path());
        dir.ensure().unwrap();
        SuggestionsPanel::new("draft.md", Mailbox::new(dir), Arc::new(MockGenerator::new()), 3)
    }

    async fn settle(panel: &SuggestionsPanel) {
        for _ in 0..100 {
            if !lock(&panel.state).status.is_loading {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("generation did not finish");
    }

    #[tokio::test]
    async fn test_request_marker_generates_batch() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        let snapshot = ContextSnapshot::from_text("# Title\nSome text here.\n", 2, "draft.md");
        panel.mailbox.request(RequestKind::Suggestions, Some(&snapshot)).unwrap();

        panel.tick().unwrap();
        assert!(!panel.mailbox.is_pending(RequestKind::Suggestions));
        settle(&panel).await;

        let state = panel.state();
        let state = lock(&state);
        assert_eq!(state.preview.state(), PreviewState::Active { index: 0, count: 3 });
        assert_eq!(state.preview.mode(), PreviewMode::Alternatives);
        assert_eq!(state.status.error_message, None);
        assert_eq!(read_snapshot(&panel.mailbox).unwrap().index, 0);
    }

    #[tokio::test]
    async fn test_missing_context_sets_error() {
        let temp = TempDir::new().unwrap();
        let panel = panel(&temp);

        panel.request_suggestions();
        settle(&panel).await;

        assert_eq!(lock(&panel.state).status.error_message.as_deref(), Some("No context available"));
        assert!(panel.view().plain_text().contains("Error: No context available"));
    }

    #[tokio::test]
    async fn test_fill_section_loads_single_candidate() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        let request = FillSectionRequest {
            heading: "Background".to_string(),
            outline: vec!["Intro".to_string(), "Background".to_string()],
        };
        panel
            .mailbox
            .request_with_payload(RequestKind::FillSection, &request)
            .unwrap();

        panel.tick().unwrap();
        settle(&panel).await;

        let fill = panel.mailbox.read_text(FILL_RESULT_FILE).unwrap();
        assert!(fill.starts_with("This section covers background."));
        let snap = read_snapshot(&panel.mailbox).unwrap();
        assert_eq!(snap.count, 1);
        assert_eq!(snap.text, fill);
    }

    #[tokio::test]
    async fn test_fill_section_without_heading_is_error() {
        let temp = TempDir::new().unwrap();
        let panel = panel(&temp);

        panel.request_fill_section(r#"{"heading": ""}"#);
        settle(&panel).await;

        assert!(
            lock(&panel.state)
                .status
                .error_message
                .as_deref()
                .is_some_and(|m| m.contains("No section heading provided"))
        );
    }

    #[tokio::test]
    async fn test_navigation_markers_cycle_preview() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        lock(&panel.state)
            .preview
            .load(vec!["a".into(), "b".into(), "c".into()], PreviewMode::Alternatives)
            .unwrap();

        panel.mailbox.request(RequestKind::PreviewPrev, None).unwrap();
        panel.tick().unwrap();
        assert_eq!(read_snapshot(&panel.mailbox).unwrap().text, "c");

        panel.mailbox.request(RequestKind::PreviewNext, None).unwrap();
        panel.tick().unwrap();
        assert_eq!(read_snapshot(&panel.mailbox).unwrap().text, "a");
    }

    #[tokio::test]
    async fn test_clear_marker_drops_batch() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        lock(&panel.state)
            .preview
            .load(vec!["a".into(), "b".into()], PreviewMode::Alternatives)
            .unwrap();

        panel.mailbox.request(RequestKind::PreviewClear, None).unwrap();
        panel.tick().unwrap();

        assert!(!panel.mailbox.is_pending(RequestKind::PreviewClear));
        assert_eq!(lock(&panel.state).preview.state(), PreviewState::Empty);
        assert_eq!(read_snapshot(&panel.mailbox).unwrap().count, 0);
        assert!(!panel.mailbox.dir().suggestion_file(1).exists());
        assert!(panel.view().plain_text().contains("No suggestions yet"));
    }

    #[tokio::test]
    async fn test_empty_panel_ignores_navigation() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);

        panel.mailbox.request(RequestKind::PreviewNext, None).unwrap();
        panel.mailbox.request(RequestKind::PreviewPrev, None).unwrap();
        panel.tick().unwrap();

        assert!(!panel.mailbox.is_pending(RequestKind::PreviewNext));
        assert!(!panel.mailbox.is_pending(RequestKind::PreviewPrev));
        assert_eq!(lock(&panel.state).preview.state(), PreviewState::Empty);
        assert!(panel.view().plain_text().contains("No suggestions yet"));
    }

    #[tokio::test]
    async fn test_pushed_messages() {
        let temp = TempDir::new().unwrap();
        let mut panel = panel(&temp);
        panel
            .mailbox
            .write_context(&ContextSnapshot::from_text("Para one.\n\n", 2, "draft.md"))
            .unwrap();

        assert_eq!(panel.handle_message(Message::bare(MessageKind::ReqSuggestions)), Flow::Continue);
        settle(&panel).await;
        assert_eq!(lock(&panel.state).preview.mode(), PreviewMode::NextParagraph);

        assert_eq!(panel.handle_message(Message::cursor_pos(1)), Flow::Continue);
        assert_eq!(panel.handle_message(Message::shutdown()), Flow::Stop);
    }
}
