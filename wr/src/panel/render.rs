//! Plain-text panel views and their terminal renderer

use std::io::{self, Write};

use colored::Colorize;
use eyre::{Context, Result};
use tracing::debug;

/// Emphasis of one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Normal,
    Dim,
    Accent,
    Highlight,
    Warning,
    Error,
}

/// What a panel shows, independent of how it is drawn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    pub title: String,
    pub lines: Vec<(Tone, String)>,
}

impl View {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, tone: Tone, text: impl Into<String>) -> &mut Self {
        self.lines.push((tone, text.into()));
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.push(Tone::Normal, "")
    }

    /// All text, one line per entry, without styling
    pub fn plain_text(&self) -> String {
        let mut text = self.title.clone();
        for (_, line) in &self.lines {
            text.push('\n');
            text.push_str(line);
        }
        text
    }
}

/// Draws views
pub trait Renderer: Send {
    fn render(&mut self, view: &View) -> Result<()>;
}

/// Renders to a terminal, redrawing only when the view changed
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    clear_screen: bool,
    last: Option<View>,
}

impl TerminalRenderer<io::Stdout> {
    /// Full-screen renderer on stdout
    pub fn stdout() -> Self {
        Self {
            out: io::stdout(),
            clear_screen: true,
            last: None,
        }
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Append-only renderer on any writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            clear_screen: false,
            last: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn styled(tone: Tone, text: &str) -> String {
    match tone {
        Tone::Normal => text.to_string(),
        Tone::Dim => text.dimmed().to_string(),
        Tone::Accent => text.cyan().to_string(),
        Tone::Highlight => text.green().bold().to_string(),
        Tone::Warning => text.yellow().to_string(),
        Tone::Error => text.red().to_string(),
    }
}

impl<W: Write + Send> Renderer for TerminalRenderer<W> {
    fn render(&mut self, view: &View) -> Result<()> {
        if self.last.as_ref() == Some(view) {
            return Ok(());
        }
        debug!(title = %view.title, lines = view.lines.len(), "TerminalRenderer::render: redrawing");

        let mut frame = String::new();
        if self.clear_screen {
            frame.push_str("\x1b[2J\x1b[H");
        }
        frame.push_str(&view.title.bold().to_string());
        frame.push('\n');
        for (tone, line) in &view.lines {
            frame.push_str(&styled(*tone, line));
            frame.push('\n');
        }

        self.out.write_all(frame.as_bytes()).context("Failed to draw panel")?;
        self.out.flush().context("Failed to flush panel")?;
        self.last = Some(view.clone());
        Ok(())
    }
}

/// Cut `text` to `max` characters, marking the cut with `...`
pub fn clip(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(max).collect();
    clipped.push_str("...");
    clipped
}
