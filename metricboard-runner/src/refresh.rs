//! Refresh task: a background worker that refreshes one chart panel on an
//! interval.
//!
//! Communication with the owner is via `mpsc` channels. The owner keeps the
//! `RefreshTask` handle (pause, resume, change granularity or rules,
//! cancel); the worker owns the panel. Every frame is tagged with the
//! generation it was computed under, and changing granularity or rules
//! starts a new generation, so a frame fetched under the old settings is
//! dropped instead of being drawn.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use metricboard_core::{Granularity, Rule};

use crate::panel::{ChartPanel, PanelRefresh};

/// Time source for the window's end. `Utc::now` outside of tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug)]
enum RefreshCommand {
    Pause,
    Resume,
    RefreshNow,
    SetGranularity { granularity: Granularity, generation: u64 },
    SetRules { rules: Vec<Rule>, generation: u64 },
    Shutdown,
}

/// What the worker sends back.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Frame { generation: u64, refresh: PanelRefresh },
    /// The whole refresh failed (the window could not be computed).
    Error { generation: u64, message: String },
}

impl RefreshEvent {
    pub fn generation(&self) -> u64 {
        match self {
            RefreshEvent::Frame { generation, .. } | RefreshEvent::Error { generation, .. } => {
                *generation
            }
        }
    }
}

/// Caller-owned handle to a running refresh worker. Dropping it cancels the
/// worker and waits for it to exit.
pub struct RefreshTask {
    commands: Sender<RefreshCommand>,
    events: Receiver<RefreshEvent>,
    cancel: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshTask {
    /// Start refreshing `panel` every `interval`, beginning immediately.
    pub fn spawn(panel: ChartPanel, interval: Duration) -> std::io::Result<Self> {
        Self::spawn_with_clock(panel, interval, Arc::new(Utc::now))
    }

    pub fn spawn_with_clock(
        panel: ChartPanel,
        interval: Duration,
        clock: Clock,
    ) -> std::io::Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            panel,
            interval,
            clock,
            commands: cmd_rx,
            events: event_tx,
            cancel: Arc::clone(&cancel),
            paused: false,
            generation: 0,
        };
        let handle = thread::Builder::new()
            .name("metricboard-refresh".into())
            .spawn(move || worker.run())?;
        info!(interval_ms = interval.as_millis() as u64, "refresh task started");

        Ok(Self {
            commands: cmd_tx,
            events: event_rx,
            cancel,
            generation,
            handle: Some(handle),
        })
    }

    /// Current generation; frames tagged with an older one are stale.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.send(RefreshCommand::Pause);
    }

    /// Resume ticking; the next refresh runs right away.
    pub fn resume(&self) {
        self.send(RefreshCommand::Resume);
    }

    pub fn refresh_now(&self) {
        self.send(RefreshCommand::RefreshNow);
    }

    pub fn set_granularity(&self, granularity: Granularity) {
        let generation = self.bump_generation();
        self.send(RefreshCommand::SetGranularity {
            granularity,
            generation,
        });
    }

    pub fn set_rules(&self, rules: Vec<Rule>) {
        let generation = self.bump_generation();
        self.send(RefreshCommand::SetRules { rules, generation });
    }

    /// Next event of the current generation, waiting at most `timeout`.
    /// Stale events are discarded along the way.
    pub fn next_event(&self, timeout: Duration) -> Option<RefreshEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let event = self.events.recv_timeout(remaining).ok()?;
            let current = self.generation();
            if event.generation() >= current {
                return Some(event);
            }
            debug!(
                stale = event.generation(),
                current, "discarding frame from an older generation"
            );
        }
    }

    /// Next frame of the current generation, skipping error events.
    pub fn next_frame(&self, timeout: Duration) -> Option<PanelRefresh> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.next_event(remaining)? {
                RefreshEvent::Frame { refresh, .. } => return Some(refresh),
                RefreshEvent::Error { message, .. } => {
                    warn!(%message, "refresh failed");
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker. An in-flight refresh finishes but its frame is not
    /// delivered.
    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn send(&self, command: RefreshCommand) {
        if self.commands.send(command).is_err() {
            debug!("refresh worker has already exited");
        }
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancel.store(true, Ordering::SeqCst);
        self.send(RefreshCommand::Shutdown);
        if handle.join().is_err() {
            warn!("refresh worker panicked");
        }
        info!("refresh task stopped");
    }
}

impl Drop for RefreshTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    panel: ChartPanel,
    interval: Duration,
    clock: Clock,
    commands: Receiver<RefreshCommand>,
    events: Sender<RefreshEvent>,
    cancel: Arc<AtomicBool>,
    paused: bool,
    generation: u64,
}

impl Worker {
    fn run(mut self) {
        let mut next_tick = Instant::now();
        loop {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            let wait = next_tick.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(wait) {
                Ok(RefreshCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => {
                    if self.apply(command) {
                        next_tick = Instant::now();
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if !self.paused && !self.tick() {
                        break;
                    }
                    next_tick = Instant::now() + self.interval;
                }
            }
        }
        debug!("refresh worker exiting");
    }

    /// Returns true when the command calls for an immediate refresh.
    fn apply(&mut self, command: RefreshCommand) -> bool {
        match command {
            RefreshCommand::Pause => {
                self.paused = true;
                false
            }
            RefreshCommand::Resume => {
                self.paused = false;
                true
            }
            RefreshCommand::RefreshNow => !self.paused,
            RefreshCommand::SetGranularity {
                granularity,
                generation,
            } => {
                self.panel.set_granularity(granularity);
                self.generation = generation;
                !self.paused
            }
            RefreshCommand::SetRules { rules, generation } => {
                self.panel.set_rules(rules);
                self.generation = generation;
                !self.paused
            }
            RefreshCommand::Shutdown => false,
        }
    }

    /// Refresh once and deliver the result. False when nobody is listening
    /// anymore.
    fn tick(&mut self) -> bool {
        let now = (self.clock)();
        let event = match self.panel.refresh(now) {
            Ok(refresh) => RefreshEvent::Frame {
                generation: self.generation,
                refresh,
            },
            Err(e) => RefreshEvent::Error {
                generation: self.generation,
                message: e.to_string(),
            },
        };
        if self.cancel.load(Ordering::SeqCst) {
            return false;
        }
        self.events.send(event).is_ok()
    }
}
