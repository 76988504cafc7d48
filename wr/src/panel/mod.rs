//! Panel control loop
//!
//! Every panel runs the same cooperative loop on a fixed cadence: drain pushed messages,
//! poll request and navigation markers, then redraw. Slow work (generation) is spawned as a
//! separate task that reports back through shared state, which the next tick reads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use eyre::Result;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::protocol::Message;

pub mod outline;
pub mod render;
pub mod review;
pub mod suggestions;

pub use outline::{OutlinePanel, outline_panel};
pub use render::{Renderer, TerminalRenderer, Tone, View};
pub use review::{ReviewPanel, ReviewResult};
pub use suggestions::SuggestionsPanel;

/// Whether the loop keeps going after a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// One panel's behaviour, driven by [`ControlLoop`]
pub trait Panel: Send {
    fn name(&self) -> &'static str;

    /// Apply a message pushed on the panel's inbound channel
    fn handle_message(&mut self, message: Message) -> Flow;

    /// Poll markers and start any requested work; must not block
    fn tick(&mut self) -> Result<()>;

    /// Current display
    fn view(&self) -> View;
}

/// Fixed-cadence driver for a [`Panel`]
pub struct ControlLoop<P: Panel> {
    panel: P,
    interval: Duration,
    inbox: Option<mpsc::UnboundedReceiver<Message>>,
    renderer: Box<dyn Renderer>,
    running: Arc<AtomicBool>,
}

impl<P: Panel> ControlLoop<P> {
    pub fn new(panel: P, interval: Duration, renderer: Box<dyn Renderer>) -> Self {
        Self {
            panel,
            interval,
            inbox: None,
            renderer,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Feed pushed messages from a subscription into the loop
    pub fn with_inbox(mut self, inbox: mpsc::UnboundedReceiver<Message>) -> Self {
        self.inbox = Some(inbox);
        self
    }

    /// Flag that stops the loop within one tick once cleared
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    /// Run until the running flag is cleared or a message asks to stop
    pub async fn run(mut self) -> Result<P> {
        info!(panel = self.panel.name(), interval = ?self.interval, "ControlLoop::run: starting");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.running.load(Ordering::SeqCst) {
            ticker.tick().await;
            if self.step() == Flow::Stop {
                self.running.store(false, Ordering::SeqCst);
            }
        }

        info!(panel = self.panel.name(), "ControlLoop::run: stopped");
        Ok(self.panel)
    }

    /// One tick: messages, markers, redraw
    pub fn step(&mut self) -> Flow {
        if let Some(inbox) = self.inbox.as_mut() {
            while let Ok(message) = inbox.try_recv() {
                debug!(panel = self.panel.name(), kind = %message.kind, "ControlLoop::step: message");
                if self.panel.handle_message(message) == Flow::Stop {
                    info!(panel = self.panel.name(), "ControlLoop::step: shutdown requested");
                    return Flow::Stop;
                }
            }
        }

        if let Err(e) = self.panel.tick() {
            warn!(panel = self.panel.name(), error = %e, "ControlLoop::step: tick failed");
        }

        if let Err(e) = self.renderer.render(&self.panel.view()) {
            warn!(panel = self.panel.name(), error = %e, "ControlLoop::step: render failed");
        }
        Flow::Continue
    }
}

/// Progress of a panel's background task, as seen by its view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStatus {
    pub is_loading: bool,
    /// Last failure, cut to display length
    pub error_message: Option<String>,
    /// Id of the newest task; results from older tasks are discarded
    latest: u64,
}

impl TaskStatus {
    /// Mark a new task as started and return its id
    pub fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.is_loading = true;
        self.error_message = None;
        self.latest
    }

    /// Mark `task` finished; false when a newer task superseded it
    pub fn finish(&mut self, task: u64) -> bool {
        if task != self.latest {
            debug!(task, latest = self.latest, "TaskStatus::finish: superseded");
            return false;
        }
        self.is_loading = false;
        true
    }

    pub fn fail(&mut self, message: &str) {
        self.error_message = Some(crate::generator::truncate_message(message));
    }
}

/// Lock shared panel state, recovering from a panicked task
pub(crate) fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
