//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

use crate::layout::StateDir;

/// Writer - editor/panel coordination
#[derive(Parser)]
#[command(
    name = "wr",
    about = "Coordinate an editor with its outline, suggestions and review panels",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the state directory and every channel
    Init,

    /// Run a panel until interrupted or told to shut down
    Panel {
        /// Panel to run (suggestions, review, outline)
        kind: PanelKind,

        /// Document being edited
        file: PathBuf,
    },

    /// Publish a document as the current context snapshot
    Context {
        /// Document to snapshot
        file: PathBuf,

        /// Cursor line (1-based)
        #[arg(short = 'n', long, default_value = "1")]
        cursor: usize,

        /// Also push the buffer to the outline panel
        #[arg(short, long)]
        push: bool,
    },

    /// Ask a panel to do something
    Request {
        /// Request kind (outline, suggestions, review, fill-section)
        kind: RequestArg,

        /// Section heading to fill
        #[arg(long)]
        heading: Option<String>,

        /// Outline entry passed to fill-section (repeatable)
        #[arg(long = "outline-item")]
        outline_item: Vec<String>,
    },

    /// Move or show the previewed suggestion
    Preview {
        /// next, prev, clear or show
        action: PreviewAction,

        /// Output format for show
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Push one message on a channel
    Send {
        /// Channel, e.g. editor_to_outline or editor→outline
        channel: String,

        /// Message type, e.g. cursor_pos
        #[arg(value_name = "TYPE")]
        kind: String,

        /// JSON payload
        data: Option<String>,
    },

    /// Print messages arriving on a channel
    Listen {
        /// Channel, e.g. suggestions_to_editor
        channel: String,

        /// Exit after this many messages
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Send the previewed suggestion to the editor as insert_text
    Accept,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PanelKind {
    Suggestions,
    Review,
    Outline,
}

impl std::str::FromStr for PanelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "PanelKind::from_str: called");
        match s.to_lowercase().as_str() {
            "suggestions" => Ok(Self::Suggestions),
            "review" => Ok(Self::Review),
            "outline" => Ok(Self::Outline),
            _ => Err(format!("Unknown panel: {}. Use suggestions, review, or outline", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestArg {
    Outline,
    Suggestions,
    Review,
    FillSection,
}

impl std::str::FromStr for RequestArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "RequestArg::from_str: called");
        match s.to_lowercase().replace('_', "-").as_str() {
            "outline" => Ok(Self::Outline),
            "suggestions" => Ok(Self::Suggestions),
            "review" => Ok(Self::Review),
            "fill-section" | "fill" => Ok(Self::FillSection),
            _ => Err(format!(
                "Unknown request: {}. Use outline, suggestions, review, or fill-section",
                s
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewAction {
    Next,
    Prev,
    Clear,
    Show,
}

impl std::str::FromStr for PreviewAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "next" => Ok(Self::Next),
            "prev" | "previous" => Ok(Self::Prev),
            "clear" => Ok(Self::Clear),
            "show" => Ok(Self::Show),
            _ => Err(format!("Unknown preview action: {}. Use next, prev, clear, or show", s)),
        }
    }
}

/// Output format for show commands
#[derive(Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

/// Path of the shared log file
pub fn get_log_path(state: &StateDir) -> PathBuf {
    let path = state.logs_dir().join("writer.log");
    debug!(?path, "get_log_path: called");
    path
}
