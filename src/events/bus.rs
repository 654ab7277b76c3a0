//! # Bounded event bus with a single consumer.
//!
//! [`EventBus`] owns a bounded [`tokio::sync::mpsc`] queue plus two lifecycle flags:
//! `running` and a readiness gate that dependents can await before emitting.
//!
//! ## Architecture
//! ```text
//! Producers (many):                          Consumer (one):
//!   Coordinator ──┐
//!   JobScheduler ─┼── emit() ──► [bounded queue] ──► listen() ──► consumer loop
//!   Jobs ─────────┘   (try_send)      (FIFO)      (poll w/ timeout)
//! ```
//!
//! ## Rules
//! - **Never blocks producers**: `emit()` uses `try_send`.
//! - **Drop-newest**: when the queue is full the event being emitted is dropped and
//!   [`EmitError::QueueFull`] is returned; queued events are untouched.
//! - **Stopped bus**: `emit()` logs a warning and returns [`EmitError::NotRunning`].
//! - **Single consumer**: the receiver is guarded; a second concurrent `listen()` ends immediately.
//! - **Bounded poll**: `listen()` waits at most `poll_interval` per attempt, then re-checks
//!   `running` and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::event::Event;
use crate::error::{EmitError, RuntimeError};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default per-attempt dequeue wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Bounded MPSC event queue with lifecycle flags.
pub struct EventBus {
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
    capacity: usize,
    poll_interval: Duration,
    running: AtomicBool,
    ready: watch::Sender<bool>,
}

impl EventBus {
    /// Creates a stopped bus with the given capacity (min 1) and the default poll interval.
    pub fn new(capacity: usize) -> Self {
        Self::with_poll_interval(capacity, DEFAULT_POLL_INTERVAL)
    }

    /// Creates a stopped bus with explicit capacity and poll interval.
    ///
    /// A zero poll interval is replaced by the default.
    pub fn with_poll_interval(capacity: usize, poll_interval: Duration) -> Self {
        let capacity = capacity.max(1);
        let poll_interval = if poll_interval.is_zero() {
            DEFAULT_POLL_INTERVAL
        } else {
            poll_interval
        };
        let (tx, rx) = mpsc::channel(capacity);
        let (ready, _) = watch::channel(false);

        Self {
            tx,
            rx: Mutex::new(rx),
            capacity,
            poll_interval,
            running: AtomicBool::new(false),
            ready,
        }
    }

    /// Marks the bus as running and opens the readiness gate.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::AcqRel) {
            debug!("event bus already running");
            return;
        }
        self.ready.send_replace(true);
        info!(capacity = self.capacity, "event bus started");
    }

    /// Marks the bus as stopped and closes the readiness gate.
    pub fn stop(&self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.ready.send_replace(false);
        if was_running {
            info!("event bus stopped");
        } else {
            debug!("event bus already stopped");
        }
    }

    /// Waits until [`start`](Self::start) has been called, or fails after `timeout`.
    pub async fn wait_for_startup(&self, timeout: Duration) -> Result<(), RuntimeError> {
        let mut ready = self.ready.subscribe();
        match tokio::time::timeout(timeout, ready.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => {
                debug!("event bus is ready");
                Ok(())
            }
            // The sender lives in `self`, so the gate cannot close while we wait on it.
            Ok(Err(_)) | Err(_) => {
                error!(?timeout, "event bus did not become ready");
                Err(RuntimeError::StartupTimeout { timeout })
            }
        }
    }

    /// Enqueues an event without blocking.
    ///
    /// Failures are logged here; the returned error is informational.
    pub fn emit(&self, event: Event) -> Result<(), EmitError> {
        let kind = event.kind();
        if !self.is_running() {
            warn!(%kind, correlation_id = event.correlation_id(), "event bus is not running, event dropped");
            return Err(EmitError::NotRunning { kind });
        }

        match self.tx.try_send(event) {
            Ok(()) => {
                debug!(%kind, "event emitted");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(event)) => {
                error!(
                    %kind,
                    correlation_id = event.correlation_id(),
                    capacity = self.capacity,
                    "event queue is full, dropping event"
                );
                Err(EmitError::QueueFull {
                    kind,
                    capacity: self.capacity,
                })
            }
            // Unreachable while `self.rx` is alive; treated like a stopped bus.
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(%kind, "event queue closed, dropping event");
                Err(EmitError::NotRunning { kind })
            }
        }
    }

    /// Yields queued events in FIFO order until the bus stops or `cancel` fires.
    ///
    /// ### Rules
    /// - Only one listener may run at a time; a concurrent second call yields nothing.
    /// - Each wait is bounded by the poll interval so a stop is observed within that bound.
    /// - When the stream ends (any reason) the bus is left stopped.
    pub fn listen(&self, cancel: CancellationToken) -> impl Stream<Item = Event> + '_ {
        async_stream::stream! {
            let Ok(mut rx) = self.rx.try_lock() else {
                error!("event bus already has an active listener");
                return;
            };
            debug!("event listener started");

            while self.is_running() {
                let polled = tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("event listener cancelled, stopping");
                        break;
                    }
                    polled = tokio::time::timeout(self.poll_interval, rx.recv()) => polled,
                };

                match polled {
                    Ok(Some(event)) => yield event,
                    Ok(None) => {
                        error!("event queue closed unexpectedly");
                        break;
                    }
                    Err(_elapsed) => continue,
                }
            }

            self.running.store(false, Ordering::Release);
            info!("event listener has stopped");
        }
    }

    /// Returns `true` between `start()` and `stop()`.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Maximum number of queued events.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured per-attempt dequeue wait.
    #[inline]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of events currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        self.capacity.saturating_sub(self.tx.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("running", &self.is_running())
            .finish()
    }
}
