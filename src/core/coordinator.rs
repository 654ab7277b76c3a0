//! # Coordinator: owns the event bus and job scheduler and drives their lifecycle.
//!
//! The [`Coordinator`] wires one [`EventBus`] to one [`JobScheduler`], runs a single
//! consumer loop that feeds bus events into the scheduler, and shuts everything down on
//! an OS termination signal, an explicit [`Coordinator::shutdown`] call, or a
//! `ShutdownRequested` event reaching the consumer.
//!
//! ## Lifecycle
//! ```text
//! Created ──run()──► Starting ──bus ready──► Running ──shutdown()──► ShuttingDown ──► Stopped
//!                       │                                                               ▲
//!                       └──────────── startup timeout (run() returns Err) ──────────────┘
//! ```
//!
//! ## Run path
//! ```text
//! run():
//!   ├─► install SIGINT/SIGTERM handlers, spawn watcher ──► shutdown()
//!   ├─► bus.start()
//!   ├─► bus.wait_for_startup(startup_timeout)     (Err ─► Stopped, return Err)
//!   ├─► jobs.startup()                            (shutdown while starting ─► Stopped, Ok)
//!   ├─► spawn consumer:  bus.listen() ──► jobs.handle_event(&event)
//!   │                                        └─ false ─► consumer exits
//!   └─► wait for either:
//!         ├─ shutdown gate (shutdown() completed)  ─► cancel + join consumer
//!         └─ consumer exited on its own            ─► shutdown()
//!
//! shutdown():
//!   ├─► bus.emit(ShutdownRequested)   (best effort)
//!   ├─► jobs.shutdown()
//!   ├─► bus.stop()
//!   └─► open shutdown gate
//! ```
//!
//! ## Rules
//! - `run()` is accepted once; later calls return [`RuntimeError::AlreadyStarted`].
//! - `shutdown()` is idempotent; only the first call does work.
//! - `running` turns true only after startup succeeded.
//! - Events enqueued after the consumer stops are discarded with the bus.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::core::shutdown::TerminationListener;
use crate::error::RuntimeError;
use crate::events::{Event, EventBus, EventKind};
use crate::jobs::JobScheduler;

/// Coordinator lifecycle state, advancing in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Starting => "starting",
            LifecycleState::Running => "running",
            LifecycleState::ShuttingDown => "shutting_down",
            LifecycleState::Stopped => "stopped",
        }
    }
}

/// Top-level runtime: event bus, job scheduler and the consumer loop between them.
pub struct Coordinator {
    config: CoordinatorConfig,
    bus: Arc<EventBus>,
    jobs: Arc<JobScheduler>,
    running: AtomicBool,
    state: watch::Sender<LifecycleState>,
    shutdown_gate: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator in the `Created` state.
    pub fn new(config: CoordinatorConfig) -> Arc<Self> {
        let bus = Arc::new(EventBus::with_poll_interval(
            config.queue_capacity_clamped(),
            config.effective_poll_interval(),
        ));
        let jobs = Arc::new(JobScheduler::new(Arc::clone(&bus)));
        let (state, _) = watch::channel(LifecycleState::Created);

        Arc::new(Self {
            config,
            bus,
            jobs,
            running: AtomicBool::new(false),
            state,
            shutdown_gate: CancellationToken::new(),
        })
    }

    /// Starts the bus and scheduler and blocks until shutdown completes.
    ///
    /// Signal handlers are installed before startup begins. Returns `Err` if the bus does
    /// not become ready within the startup timeout or if the coordinator was already started.
    pub async fn run(self: &Arc<Self>) -> Result<(), RuntimeError> {
        let claimed = self.state.send_if_modified(|state| {
            if *state == LifecycleState::Created {
                *state = LifecycleState::Starting;
                true
            } else {
                false
            }
        });
        if !claimed {
            warn!(state = self.state().as_str(), "run() called more than once");
            return Err(RuntimeError::AlreadyStarted);
        }

        match TerminationListener::install() {
            Ok(signals) => self.spawn_signal_watcher(signals),
            Err(e) => {
                let err = RuntimeError::from(e);
                warn!(error = %err, label = err.as_label(), "signal-driven shutdown unavailable");
            }
        }

        info!("Application is starting...");
        let started = tokio::select! {
            res = self.startup() => Some(res),
            _ = self.shutdown_gate.cancelled() => None,
        };
        match started {
            Some(Ok(())) => self.running.store(true, Ordering::Release),
            Some(Err(e)) => {
                self.abort_startup().await;
                error!(error = %e, label = e.as_label(), "startup failed");
                return Err(e);
            }
            None => {}
        }
        // A shutdown that arrived while starting only opened the gate.
        if self.shutdown_gate.is_cancelled() {
            info!("shutdown requested during startup");
            self.abort_startup().await;
            info!("Application has finished running.");
            return Ok(());
        }

        let consumer_token = CancellationToken::new();
        let mut consumer = tokio::spawn(
            consume(
                Arc::clone(&self.bus),
                Arc::clone(&self.jobs),
                consumer_token.clone(),
            )
            .in_current_span(),
        );
        self.state.send_if_modified(|state| {
            if *state == LifecycleState::Starting {
                *state = LifecycleState::Running;
                true
            } else {
                false
            }
        });
        info!("Application is running. Press Ctrl+C to stop.");

        tokio::select! {
            _ = self.shutdown_gate.cancelled() => {
                consumer_token.cancel();
                if let Err(e) = consumer.await {
                    if !e.is_cancelled() {
                        error!(error = %e, "event consumer terminated abnormally");
                    }
                }
            }
            joined = &mut consumer => {
                if let Err(e) = joined {
                    error!(error = %e, "event consumer terminated abnormally");
                }
                if self.is_running() {
                    self.shutdown().await;
                }
                self.shutdown_gate.cancelled().await;
            }
        }

        self.state.send_replace(LifecycleState::Stopped);
        info!("Application has finished running.");
        Ok(())
    }

    /// Stops the scheduler and the bus. Safe to call repeatedly and from any task.
    ///
    /// During startup this only requests the stop; `run()` tears down once startup yields.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            if self.state() == LifecycleState::Starting {
                info!("shutdown requested while starting");
                self.shutdown_gate.cancel();
            } else {
                warn!("Application is not running, nothing to shut down.");
            }
            return;
        }

        self.state.send_replace(LifecycleState::ShuttingDown);
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.bus.emit(Event::new(EventKind::ShutdownRequested)) {
            debug!(label = e.as_label(), "shutdown request not enqueued");
        }
        self.jobs.shutdown().await;
        self.bus.stop();
        self.shutdown_gate.cancel();

        info!("Shutdown complete.");
    }

    /// Event bus shared with the scheduler.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Job scheduler driven by the consumer loop.
    pub fn jobs(&self) -> &Arc<JobScheduler> {
        &self.jobs
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// True between a successful startup and the first `shutdown()`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Resolves once the coordinator leaves `Starting`; true if it reached `Running`.
    pub async fn wait_until_running(&self) -> bool {
        let mut rx = self.state.subscribe();
        match rx
            .wait_for(|s| *s >= LifecycleState::Running)
            .await
        {
            Ok(state) => *state == LifecycleState::Running,
            Err(_) => false,
        }
    }

    async fn startup(&self) -> Result<(), RuntimeError> {
        self.bus.start();
        self.bus.wait_for_startup(self.config.startup_timeout).await?;
        self.jobs.startup().await;
        Ok(())
    }

    /// Leaves everything stopped after a failed or interrupted startup.
    async fn abort_startup(&self) {
        self.running.store(false, Ordering::Release);
        self.jobs.shutdown().await;
        self.bus.stop();
        self.shutdown_gate.cancel();
        self.state.send_replace(LifecycleState::Stopped);
    }

    fn spawn_signal_watcher(self: &Arc<Self>, mut signals: TerminationListener) {
        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                tokio::select! {
                    _ = this.shutdown_gate.cancelled() => {}
                    received = signals.recv() => {
                        if let Some(signal) = received {
                            info!(signal = %signal, "termination signal received");
                            this.shutdown().await;
                        }
                    }
                }
            }
            .in_current_span(),
        );
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish()
    }
}

/// Single consumer: drains the bus into the scheduler until either side stops.
async fn consume(bus: Arc<EventBus>, jobs: Arc<JobScheduler>, cancel: CancellationToken) {
    let events = bus.listen(cancel);
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        debug!(
            kind = %event.kind(),
            correlation_id = event.correlation_id(),
            "Processing event"
        );
        if !jobs.handle_event(&event).await {
            info!("event consumer stopping");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::{sleep, timeout};
    use tracing_test::traced_test;

    use super::*;
    use crate::error::JobError;
    use crate::jobs::{JobFn, JobOptions, Trigger};

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            queue_capacity: 16,
            poll_interval: Duration::from_millis(20),
            startup_timeout: Duration::from_secs(1),
        }
    }

    fn spawn_run(
        coordinator: &Arc<Coordinator>,
    ) -> tokio::task::JoinHandle<Result<(), RuntimeError>> {
        let coordinator = Arc::clone(coordinator);
        tokio::spawn(async move { coordinator.run().await }.in_current_span())
    }

    #[tokio::test]
    async fn test_new_coordinator_is_idle() {
        let coordinator = Coordinator::new(CoordinatorConfig::default());
        assert_eq!(coordinator.state(), LifecycleState::Created);
        assert!(!coordinator.is_running());
        assert!(!coordinator.bus().is_running());
        assert_eq!(coordinator.bus().capacity(), 1000);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_job_started_event_is_dispatched_end_to_end() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        coordinator
            .bus()
            .emit(
                Event::new(EventKind::JobStarted)
                    .with_field("job_id", "abc")
                    .with_correlation_id("c1"),
            )
            .unwrap();
        sleep(Duration::from_millis(200)).await;

        coordinator.shutdown().await;
        timeout(Duration::from_secs(2), runner)
            .await
            .expect("run() should return after shutdown")
            .unwrap()
            .unwrap();

        assert!(logs_contain("Job started: abc"));
        assert!(logs_contain("Processing event"));
        assert!(logs_contain("c1"));
        assert!(logs_contain("Application has finished running."));
        assert!(!coordinator.bus().is_running());
        assert!(!coordinator.jobs().is_running());
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_shutdown_is_idempotent() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        coordinator.shutdown().await;
        coordinator.shutdown().await;
        timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|l| l.contains("Shutdown complete.")).count() {
                1 => Ok(()),
                n => Err(format!("expected one completed shutdown, saw {n}")),
            }
        });
        logs_assert(|lines: &[&str]| {
            let emitted = lines
                .iter()
                .filter(|l| l.contains("event emitted") && l.contains("shutdown_requested"))
                .count();
            match emitted {
                1 => Ok(()),
                n => Err(format!("expected one shutdown request, saw {n}")),
            }
        });
        assert!(logs_contain("nothing to shut down"));
    }

    #[tokio::test]
    async fn test_repeated_shutdown_enqueues_one_request() {
        let coordinator = Coordinator::new(fast_config());
        coordinator.bus().start();
        coordinator.running.store(true, Ordering::Release);

        coordinator.shutdown().await;
        coordinator.shutdown().await;

        assert_eq!(coordinator.bus().len(), 1);
        assert!(coordinator.shutdown_gate.is_cancelled());
        assert!(!coordinator.bus().is_running());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_consumer_continues_after_faulting_event() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        let bus = coordinator.bus();
        bus.emit(Event::new(EventKind::JobStarted).with_correlation_id("broken"))
            .unwrap();
        bus.emit(Event::new(EventKind::JobStarted).with_field("job_id", "after-fault"))
            .unwrap();
        sleep(Duration::from_millis(200)).await;

        coordinator.shutdown().await;
        timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(logs_contain("payload is missing `job_id`"));
        assert!(logs_contain("Job started: after-fault"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_shutdown_while_starting_only_requests_stop() {
        let coordinator = Coordinator::new(fast_config());
        coordinator.state.send_replace(LifecycleState::Starting);

        coordinator.shutdown().await;

        assert!(coordinator.shutdown_gate.is_cancelled());
        assert!(!coordinator.is_running());
        assert!(logs_contain("shutdown requested while starting"));
        assert!(!logs_contain("nothing to shut down"));
    }

    #[tokio::test]
    async fn test_stop_requested_during_startup_leaves_everything_stopped() {
        let coordinator = Coordinator::new(fast_config());
        coordinator.shutdown_gate.cancel();

        timeout(Duration::from_secs(2), coordinator.run())
            .await
            .expect("run() should not wait for a stop requested during startup")
            .unwrap();

        assert_eq!(coordinator.state(), LifecycleState::Stopped);
        assert!(!coordinator.is_running());
        assert!(!coordinator.jobs().is_running());
        assert!(!coordinator.bus().is_running());
        assert!(!coordinator.wait_until_running().await);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_shutdown_event_from_producer_stops_runtime() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        let bus = coordinator.bus();
        bus.emit(Event::new(EventKind::ShutdownRequested)).unwrap();
        bus.emit(Event::new(EventKind::JobStarted).with_field("job_id", "late"))
            .unwrap();

        timeout(Duration::from_secs(2), runner)
            .await
            .expect("consumer exit should end run()")
            .unwrap()
            .unwrap();
        assert!(!coordinator.is_running());
        assert!(!coordinator.bus().is_running());
        assert_eq!(coordinator.state(), LifecycleState::Stopped);
        assert!(!logs_contain("Job started: late"));
    }

    #[tokio::test]
    async fn test_second_run_is_rejected() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        let err = coordinator.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyStarted));

        coordinator.shutdown().await;
        timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    #[traced_test]
    async fn test_scheduled_job_reports_through_bus() {
        let coordinator = Coordinator::new(fast_config());
        let runner = spawn_run(&coordinator);
        assert!(coordinator.wait_until_running().await);

        let job = JobFn::arc("tick", |_ctx: CancellationToken| async {
            Ok::<_, JobError>(())
        });
        let id = coordinator
            .jobs()
            .add_job(
                job,
                Trigger::interval(Duration::from_millis(30)).unwrap(),
                JobOptions::default().with_id("tick"),
            )
            .await
            .unwrap();
        assert_eq!(id, "tick");

        sleep(Duration::from_millis(250)).await;
        coordinator.shutdown().await;
        timeout(Duration::from_secs(2), runner)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(logs_contain("Job started: tick"));
        assert!(coordinator.jobs().job_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_before_run_is_ignored() {
        let coordinator = Coordinator::new(fast_config());
        coordinator.shutdown().await;
        assert_eq!(coordinator.state(), LifecycleState::Created);
    }
}
