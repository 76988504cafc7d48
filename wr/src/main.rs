//! Writer - editor/panel coordination
//!
//! CLI entry point for running panels and driving them from the editor side.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result, bail};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use writer::channel::{Channel, Subscription, SubscriptionConfig, ensure_channels};
use writer::cli::{Cli, Command, OutputFormat, PanelKind, PreviewAction, RequestArg, get_log_path};
use writer::config::Config;
use writer::editor::EditorLink;
use writer::generator::create_generator;
use writer::mailbox::{ContextSnapshot, Mailbox, RequestKind};
use writer::panel::{ControlLoop, Panel, ReviewPanel, SuggestionsPanel, TerminalRenderer, outline_panel};
use writer::protocol::{Message, MessageKind};

fn setup_logging(log_path: &Path, cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    // Several panels share one log file, so append rather than truncate
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate()?;

    let state = config.state();
    setup_logging(
        &get_log_path(&state),
        cli.log_level.as_deref(),
        config.log_level.as_deref(),
    )
    .context("Failed to setup logging")?;
    info!(state_dir = %state.root().display(), "Writer loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Init => cmd_init(&config),
        Command::Panel { kind, file } => cmd_panel(&config, kind, &file).await,
        Command::Context { file, cursor, push } => cmd_context(&config, &file, cursor, push),
        Command::Request {
            kind,
            heading,
            outline_item,
        } => cmd_request(&config, kind, heading, outline_item),
        Command::Preview { action, format } => cmd_preview(&config, action, format),
        Command::Send { channel, kind, data } => cmd_send(&config, &channel, &kind, data.as_deref()),
        Command::Listen { channel, count } => cmd_listen(&config, &channel, count).await,
        Command::Accept => cmd_accept(&config),
    }
}

fn cmd_init(config: &Config) -> Result<()> {
    let link = EditorLink::new(config.state());
    link.ensure()?;
    println!("Initialized {}", config.state().root().display());
    for channel in Channel::ALL {
        println!("  {} -> {}", channel, channel.path(&config.state()).display());
    }
    Ok(())
}

/// Clear `running` on SIGINT or SIGTERM
fn spawn_signal_watcher(running: Arc<AtomicBool>) -> Result<tokio::task::JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, stopping"),
            _ = sigterm.recv() => info!("Received SIGTERM, stopping"),
        }
        running.store(false, Ordering::SeqCst);
    }))
}

async fn run_panel<P: Panel>(control: ControlLoop<P>) -> Result<()> {
    let watcher = spawn_signal_watcher(control.running_flag())?;
    control.run().await?;
    watcher.abort();
    Ok(())
}

async fn cmd_panel(config: &Config, kind: PanelKind, file: &Path) -> Result<()> {
    info!(?kind, file = %file.display(), "cmd_panel: called");
    let state = config.state();
    state.ensure()?;
    ensure_channels(&state)?;

    let mailbox = Mailbox::new(state.clone());
    let filename = file.display().to_string();
    let subscription_config = SubscriptionConfig::from(&config.channel);
    let renderer = Box::new(TerminalRenderer::stdout());

    match kind {
        PanelKind::Suggestions => {
            let generator = create_generator(&config.generator);
            let panel = SuggestionsPanel::new(filename, mailbox, generator, config.suggestions.count);
            let (subscription, inbox) =
                Subscription::forward(&Channel::EditorToSuggestions.path(&state), subscription_config)?;
            let interval = Duration::from_millis(config.panels.suggestions_tick_ms);
            let result = run_panel(ControlLoop::new(panel, interval, renderer).with_inbox(inbox)).await;
            subscription.shutdown().await?;
            result
        }
        PanelKind::Review => {
            let generator = create_generator(&config.generator);
            let panel = ReviewPanel::new(filename, mailbox, generator);
            let interval = Duration::from_millis(config.panels.review_tick_ms);
            run_panel(ControlLoop::new(panel, interval, renderer)).await
        }
        PanelKind::Outline => {
            let panel = outline_panel(file, mailbox);
            let (subscription, inbox) =
                Subscription::forward(&Channel::EditorToOutline.path(&state), subscription_config)?;
            let interval = Duration::from_millis(config.panels.outline_tick_ms);
            let result = run_panel(ControlLoop::new(panel, interval, renderer).with_inbox(inbox)).await;
            subscription.shutdown().await?;
            result
        }
    }
}

fn cmd_context(config: &Config, file: &Path, cursor: usize, push: bool) -> Result<()> {
    debug!(file = %file.display(), cursor, push, "cmd_context: called");
    let text = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
    let snapshot = ContextSnapshot::from_text(&text, cursor, &file.display().to_string());

    let link = EditorLink::new(config.state());
    link.ensure()?;
    link.write_context(&snapshot)?;
    println!(
        "Wrote context: {} lines, cursor at {}",
        snapshot.lines.len(),
        snapshot.cursor_line
    );

    if push {
        if link.push_buffer(&snapshot) {
            println!("Pushed buffer to {}", Channel::EditorToOutline);
        } else {
            println!("No reader on {}, buffer not pushed", Channel::EditorToOutline);
        }
    }
    Ok(())
}

fn cmd_request(config: &Config, kind: RequestArg, heading: Option<String>, outline: Vec<String>) -> Result<()> {
    let link = EditorLink::new(config.state());
    link.mailbox().dir().ensure()?;

    let kind = match kind {
        RequestArg::FillSection => {
            let Some(heading) = heading.filter(|h| !h.trim().is_empty()) else {
                bail!("fill-section needs --heading");
            };
            link.request_fill_section(&heading, outline)?;
            RequestKind::FillSection
        }
        RequestArg::Outline => RequestKind::Outline,
        RequestArg::Suggestions => RequestKind::Suggestions,
        RequestArg::Review => RequestKind::Review,
    };

    if kind != RequestKind::FillSection {
        link.request(kind, None)?;
    }
    println!("Requested {}", kind);
    Ok(())
}

fn cmd_preview(config: &Config, action: PreviewAction, format: OutputFormat) -> Result<()> {
    let link = EditorLink::new(config.state());
    match action {
        PreviewAction::Next => {
            link.mailbox().dir().ensure()?;
            link.preview_next()?;
            println!("Requested next candidate");
        }
        PreviewAction::Prev => {
            link.mailbox().dir().ensure()?;
            link.preview_prev()?;
            println!("Requested previous candidate");
        }
        PreviewAction::Clear => {
            link.mailbox().dir().ensure()?;
            link.preview_clear()?;
            println!("Requested clearing suggestions");
        }
        PreviewAction::Show => match (link.preview_state(), format) {
            (None, OutputFormat::Json) => println!("null"),
            (None, OutputFormat::Text) => println!("No suggestions yet"),
            (Some(snapshot), OutputFormat::Json) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            (Some(snapshot), OutputFormat::Text) => {
                if snapshot.count == 0 {
                    println!("No suggestions yet");
                } else {
                    println!("[{}/{}] {}", snapshot.index + 1, snapshot.count, snapshot.mode);
                    println!("{}", snapshot.text);
                }
            }
        },
    }
    Ok(())
}

fn cmd_send(config: &Config, channel: &str, kind: &str, data: Option<&str>) -> Result<()> {
    let channel: Channel = channel.parse()?;
    let data = data
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Message data must be JSON")?;
    let message = Message::new(MessageKind::from_tag(kind), data);

    let link = EditorLink::new(config.state());
    if link.send(channel, &message) {
        println!("Sent {} on {}", message.kind, channel);
    } else {
        println!("No reader on {}, dropped", channel);
    }
    Ok(())
}

async fn cmd_listen(config: &Config, channel: &str, count: Option<usize>) -> Result<()> {
    let channel: Channel = channel.parse()?;
    let state = config.state();
    state.ensure()?;
    ensure_channels(&state)?;

    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let (subscription, mut inbox) =
        Subscription::forward(&channel.path(&state), SubscriptionConfig::from(&config.channel))?;
    info!(%channel, "cmd_listen: listening");

    let mut received = 0usize;
    loop {
        tokio::select! {
            message = inbox.recv() => {
                let Some(message) = message else {
                    warn!("cmd_listen: subscription ended");
                    break;
                };
                println!("{}", message.encode());
                received += 1;
                if count.is_some_and(|n| received >= n) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("cmd_listen: interrupted");
                break;
            }
            _ = sigterm.recv() => {
                info!("cmd_listen: terminated");
                break;
            }
        }
    }

    subscription.shutdown().await
}

fn cmd_accept(config: &Config) -> Result<()> {
    let link = EditorLink::new(config.state());
    match link.accept() {
        Some(accepted) => {
            if !accepted.delivered {
                eprintln!("No reader on {}", Channel::SuggestionsToEditor);
            }
            println!("{}", accepted.text);
        }
        None => println!("No suggestions yet"),
    }
    Ok(())
}
