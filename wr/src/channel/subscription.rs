//! Subscription loop for an inbound channel
//!
//! One background thread per inbound pipe owns the open/read/reopen lifecycle:
//!
//! - **Disconnected**: try to open; on failure sleep `retry_backoff` and try again.
//! - **Connected**: wait (bounded) for data, split complete lines out of the accumulated bytes
//!   and hand each decoded message to the handler. A zero-byte read means every writer closed;
//!   that is routine for named pipes, so the reader closes, pauses briefly and reopens.
//! - **Stopped**: the running flag is cleared; the thread notices within one wait interval,
//!   drops the descriptor and exits.
//!
//! Handler failures (errors or panics) are logged and the loop keeps going.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::endpoint::{ChannelReader, ReadOutcome};
use crate::config::ChannelConfig;
use crate::protocol::{Message, decode};

/// Timing knobs for a subscription
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionConfig {
    /// Longest single wait for readability; bounds stop latency
    pub poll_timeout: Duration,
    /// Sleep between failed open attempts
    pub retry_backoff: Duration,
    /// Pause after EOF before reopening
    pub reopen_pause: Duration,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(500),
            retry_backoff: Duration::from_millis(500),
            reopen_pause: Duration::from_millis(100),
        }
    }
}

impl From<&ChannelConfig> for SubscriptionConfig {
    fn from(config: &ChannelConfig) -> Self {
        Self {
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            reopen_pause: Duration::from_millis(config.reopen_pause_ms),
        }
    }
}

/// Receiver of decoded messages
///
/// Returning an error does not stop the subscription; it is logged and the next message is
/// delivered as usual.
pub trait MessageHandler: Send + 'static {
    fn handle(&mut self, message: Message) -> Result<()>;
}

impl<F> MessageHandler for F
where
    F: FnMut(Message) -> Result<()> + Send + 'static,
{
    fn handle(&mut self, message: Message) -> Result<()> {
        self(message)
    }
}

/// Accumulates raw bytes and yields complete lines
///
/// Bytes are kept until a newline arrives, so a multi-byte character split across reads is
/// decoded intact. Invalid UTF-8 is replaced rather than rejected. Blank lines are skipped.
#[derive(Debug, Default)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        &mut self.bytes
    }

    /// Bytes still waiting for a newline
    pub fn pending(&self) -> usize {
        self.bytes.len()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Remove and return every complete line
    pub fn drain_lines(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(pos) = self.bytes.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.bytes.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]).into_owned();
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        lines
    }
}

/// Handle to a running subscription thread
#[derive(Debug)]
pub struct Subscription {
    path: PathBuf,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Start reading `path` in a background thread
    pub fn spawn<H: MessageHandler>(path: &Path, config: SubscriptionConfig, handler: H) -> Result<Self> {
        debug!(?path, ?config, "Subscription::spawn: called");
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let thread_path = path.to_path_buf();
        let name = format!(
            "sub-{}",
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
        );

        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run_loop(&thread_path, config, &thread_running, handler))
            .context("Failed to spawn subscription thread")?;

        Ok(Self {
            path: path.to_path_buf(),
            running,
            thread: Some(thread),
        })
    }

    /// Start a subscription that forwards every message into an async channel
    pub fn forward(path: &Path, config: SubscriptionConfig) -> Result<(Self, mpsc::UnboundedReceiver<Message>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = Self::spawn(path, config, move |message: Message| {
            tx.send(message).map_err(|_| eyre::eyre!("Subscription receiver dropped"))
        })?;
        Ok((subscription, rx))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Shared stop flag; clearing it stops the loop
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(&mut self) {
        debug!(path = ?self.path, "Subscription::stop: called");
        self.running.store(false, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(path = ?self.path, "Subscription thread panicked");
            }
        }
    }

    /// Stop from async code without blocking a runtime worker on the join
    pub async fn shutdown(mut self) -> Result<()> {
        tokio::task::spawn_blocking(move || self.stop())
            .await
            .context("Subscription shutdown task failed")
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<H: MessageHandler>(path: &Path, config: SubscriptionConfig, running: &AtomicBool, mut handler: H) {
    info!(?path, "Subscription started");
    let mut buffer = LineBuffer::default();

    while running.load(Ordering::Acquire) {
        // Disconnected
        let mut reader = match ChannelReader::open(path) {
            Ok(reader) => reader,
            Err(e) => {
                debug!(?path, error = %e, "Subscription: open failed, retrying");
                sleep_while_running(running, config.retry_backoff);
                continue;
            }
        };

        // Connected
        buffer.clear();
        pump(&mut reader, config, running, &mut buffer, &mut handler);
        drop(reader);

        if running.load(Ordering::Acquire) {
            thread::sleep(config.reopen_pause);
        }
    }

    info!(?path, "Subscription stopped");
}

/// Read until EOF, a read error, or stop
fn pump<H: MessageHandler>(
    reader: &mut ChannelReader,
    config: SubscriptionConfig,
    running: &AtomicBool,
    buffer: &mut LineBuffer,
    handler: &mut H,
) {
    while running.load(Ordering::Acquire) {
        match reader.wait_readable(config.poll_timeout) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(e) => {
                debug!(path = ?reader.path(), error = %e, "Subscription: wait failed, reopening");
                return;
            }
        }

        match reader.read_available(buffer.bytes_mut()) {
            Ok(ReadOutcome::Data(_)) => {
                for line in buffer.drain_lines() {
                    dispatch(handler, &line);
                }
            }
            Ok(ReadOutcome::Empty) => {}
            Ok(ReadOutcome::Eof) => {
                if buffer.pending() > 0 {
                    debug!(pending = buffer.pending(), "Subscription: discarding partial line at EOF");
                }
                debug!(path = ?reader.path(), "Subscription: writer closed, reopening");
                return;
            }
            Err(e) => {
                debug!(path = ?reader.path(), error = %e, "Subscription: read failed, reopening");
                return;
            }
        }
    }
}

fn dispatch<H: MessageHandler>(handler: &mut H, line: &str) {
    let message = decode(line);
    let kind = message.kind.clone();
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(%kind, error = %e, "Subscription: handler failed"),
        Err(_) => warn!(%kind, "Subscription: handler panicked"),
    }
}

fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    let step = Duration::from_millis(50);
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(step.min(deadline - now));
    }
}
