//! Document outline extraction
//!
//! Panels treat outline extraction as an opaque function from document lines to a
//! [`DocumentOutline`]. [`MarkdownOutline`] handles ATX headings (`#` to `######`), skips
//! YAML frontmatter and fenced code, and notes each fenced block as an outline item.
//! [`LatexOutline`] handles the sectioning commands from `\part` to `\subsubsection`.
//! [`parser_for_path`] picks one by file extension.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("Valid heading regex"));

static TRAILING_HASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*#+\s*$").expect("Valid trailing hash regex"));

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w+\b").expect("Valid word regex"));

static LATEX_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(part|chapter|section|subsection|subsubsection)\*?\{([^}]*)\}").expect("Valid latex section regex")
});

static LATEX_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\title\{([^}]*)\}").expect("Valid latex title regex"));

static LATEX_COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%.*$").expect("Valid latex comment regex"));

static LATEX_COMMAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\[a-zA-Z]+\*?(\{[^}]*\})*(\[[^\]]*\])*").expect("Valid latex command regex")
});

static LATEX_SYNTAX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[{}\\$&~^_]").expect("Valid latex syntax regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Heading,
    Code,
    Frontmatter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineItem {
    /// 1-6 for headings, 0 otherwise
    pub level: usize,
    pub text: String,
    /// 1-based
    pub line_number: usize,
    pub kind: ItemKind,
}

impl OutlineItem {
    pub fn is_heading(&self) -> bool {
        self.kind == ItemKind::Heading
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentOutline {
    pub items: Vec<OutlineItem>,
    /// First level-1 heading, or `\title{}` for LaTeX
    pub title: Option<String>,
    pub word_count: usize,
    pub line_count: usize,
}

impl DocumentOutline {
    pub fn headings(&self) -> impl Iterator<Item = &OutlineItem> {
        self.items.iter().filter(|item| item.is_heading())
    }

    /// Last heading at or above `cursor_line`
    pub fn current_section(&self, cursor_line: usize) -> Option<&OutlineItem> {
        self.headings().take_while(|h| h.line_number <= cursor_line).last()
    }

    /// Whether the section under `heading` has only blank lines before the next heading
    pub fn is_section_empty(&self, heading: &OutlineItem, lines: &[String]) -> bool {
        if !heading.is_heading() {
            return false;
        }
        let end = self
            .headings()
            .find(|h| h.line_number > heading.line_number)
            .map(|h| h.line_number - 1)
            .unwrap_or(lines.len());
        lines
            .iter()
            .take(end)
            .skip(heading.line_number)
            .all(|line| line.trim().is_empty())
    }

    pub fn empty_section_count(&self, lines: &[String]) -> usize {
        self.headings().filter(|h| self.is_section_empty(h, lines)).count()
    }
}

/// Turns document lines into an outline
pub trait OutlineParser: Send + Sync {
    fn parse(&self, lines: &[String]) -> DocumentOutline;
}

/// Markdown outline parser
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownOutline;

impl OutlineParser for MarkdownOutline {
    fn parse(&self, lines: &[String]) -> DocumentOutline {
        debug!(lines = lines.len(), "MarkdownOutline::parse: called");
        let mut items = Vec::new();
        let mut title = None;
        let mut in_frontmatter = false;
        let mut in_code = false;
        let mut word_count = 0;

        for (i, line) in lines.iter().enumerate() {
            let line_number = i + 1;

            if line_number == 1 && line.trim_end() == "---" {
                in_frontmatter = true;
                items.push(OutlineItem {
                    level: 0,
                    text: "[frontmatter]".to_string(),
                    line_number,
                    kind: ItemKind::Frontmatter,
                });
                continue;
            }
            if in_frontmatter {
                if line.trim_end() == "---" {
                    in_frontmatter = false;
                }
                continue;
            }

            if let Some(lang) = line.strip_prefix("```") {
                if !in_code {
                    let lang = match lang.trim() {
                        "" => "code",
                        lang => lang,
                    };
                    items.push(OutlineItem {
                        level: 0,
                        text: format!("[{}]", lang),
                        line_number,
                        kind: ItemKind::Code,
                    });
                }
                in_code = !in_code;
                continue;
            }
            if in_code {
                continue;
            }

            word_count += WORD.find_iter(line).count();

            if let Some(caps) = HEADING.captures(line) {
                let level = caps[1].len();
                let text = TRAILING_HASHES.replace(caps[2].trim(), "").to_string();
                if level == 1 && title.is_none() {
                    title = Some(text.clone());
                }
                items.push(OutlineItem {
                    level,
                    text,
                    line_number,
                    kind: ItemKind::Heading,
                });
            }
        }

        DocumentOutline {
            items,
            title,
            word_count,
            line_count: lines.len(),
        }
    }
}

/// LaTeX outline parser
///
/// Levels run from `\part` (1) to `\subsubsection` (5). Starred forms count the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct LatexOutline;

impl LatexOutline {
    fn level(command: &str) -> usize {
        match command {
            "part" => 1,
            "chapter" => 2,
            "section" => 3,
            "subsection" => 4,
            _ => 5,
        }
    }
}

impl OutlineParser for LatexOutline {
    fn parse(&self, lines: &[String]) -> DocumentOutline {
        debug!(lines = lines.len(), "LatexOutline::parse: called");
        let mut items = Vec::new();
        let mut title = None;
        let mut word_count = 0;

        for (i, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with('%') {
                continue;
            }
            let code = LATEX_COMMENT.replace(line, "");

            if title.is_none()
                && let Some(caps) = LATEX_TITLE.captures(&code)
            {
                title = Some(caps[1].trim().to_string());
            }

            for caps in LATEX_SECTION.captures_iter(&code) {
                items.push(OutlineItem {
                    level: Self::level(&caps[1]),
                    text: caps[2].trim().to_string(),
                    line_number: i + 1,
                    kind: ItemKind::Heading,
                });
            }

            let text = LATEX_COMMAND.replace_all(&code, " ");
            let text = LATEX_SYNTAX.replace_all(&text, " ");
            word_count += WORD.find_iter(&text).count();
        }

        DocumentOutline {
            items,
            title,
            word_count,
            line_count: lines.len(),
        }
    }
}

/// Parser for a document, chosen by extension; anything but `.tex` is markdown
pub fn parser_for_path(path: &Path) -> Box<dyn OutlineParser> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tex") => Box::new(LatexOutline),
        _ => Box::new(MarkdownOutline),
    }
}
