//! # JobScheduler: the event-facing side of job scheduling.
//!
//! Wraps the time-based [`Engine`] and connects it to the [`EventBus`]:
//! - **reacts** to events dispatched by the coordinator's consumer loop ([`JobScheduler::handle_event`])
//! - **emits** events for every job run and on behalf of jobs ([`JobScheduler::emit_event`])
//!
//! ## Event flow
//! ```text
//! Engine fires job ──► Reporting wrapper
//!                        ├─► emit JobStarted   {job_id, job_name}  correlation = run id
//!                        ├─► job.run(ctx)                      (panics caught → JobError::Panicked)
//!                        └─► emit JobCompleted {job_id, job_name}
//!                            or JobFailed      {job_id, job_name, error, error_label}
//!
//! consumer loop ──► handle_event(&Event)
//!                     ├─ JobStarted          → record run (JobTracker)      → continue
//!                     ├─ JobCompleted/Failed → clear run (by correlation id) → continue
//!                     ├─ ShutdownRequested                                  → stop
//!                     └─ other               → warn                         → continue
//! ```
//!
//! ## Rules
//! - A fault (error or panic) while handling one event is logged and never stops the loop.
//! - `add_job` is rejected while the scheduler is stopped.
//! - `shutdown()` never waits for running jobs.

use std::ops::ControlFlow;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{HandlerError, JobError, SchedulerError};
use crate::events::{Event, EventBus, EventKind};
use crate::jobs::tracker::run_key;
use crate::jobs::{Engine, Job, JobId, JobOptions, JobRef, JobRun, JobTracker, Trigger};

/// Reacts to dispatched events and registers time-based jobs.
pub struct JobScheduler {
    engine: Engine,
    bus: Arc<EventBus>,
    tracker: JobTracker,
    running: AtomicBool,
}

impl JobScheduler {
    /// Creates a stopped scheduler publishing to `bus`.
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            engine: Engine::new(),
            bus,
            tracker: JobTracker::new(),
            running: AtomicBool::new(false),
        }
    }

    /// Starts the engine. Idempotent.
    pub async fn startup(&self) {
        if self.running.load(Ordering::Acquire) {
            debug!("job scheduler already running");
            return;
        }
        info!("job scheduler is starting up");
        self.engine.start().await;
        self.running.store(true, Ordering::Release);
    }

    /// Stops accepting jobs and stops the engine without waiting for running jobs.
    ///
    /// Safe to call before `startup()` and more than once.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            debug!("job scheduler not running, nothing to stop");
            return;
        }
        self.engine.shutdown().await;
        info!("job scheduler stopped");
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Registers `job` to run per `trigger`.
    ///
    /// Each run emits `JobStarted` followed by `JobCompleted` or `JobFailed`.
    /// While stopped the registration is rejected with a warning.
    pub async fn add_job(
        &self,
        job: JobRef,
        trigger: Trigger,
        mut options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        if !self.is_running() {
            warn!(job_name = job.name(), "job scheduler is not running, job rejected");
            return Err(SchedulerError::NotRunning);
        }

        let id = options
            .id
            .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string())
            .clone();
        let reporting: JobRef = Arc::new(Reporting {
            id,
            inner: job,
            bus: Arc::clone(&self.bus),
        });

        self.engine
            .add_job(reporting, trigger, options)
            .await
            .inspect_err(|e| warn!(error = %e, label = e.as_label(), "job registration failed"))
    }

    /// Unschedules a job; returns false if the id is unknown.
    pub async fn remove_job(&self, id: &str) -> bool {
        self.engine.remove_job(id).await
    }

    /// Returns registered job ids, sorted.
    pub async fn job_ids(&self) -> Vec<JobId> {
        self.engine.job_ids().await
    }

    /// Returns job runs reported as started but not yet finished.
    pub async fn running_jobs(&self) -> Vec<JobRun> {
        self.tracker.snapshot().await
    }

    /// Handles one dispatched event.
    ///
    /// Returns `false` only for [`EventKind::ShutdownRequested`], telling the consumer
    /// loop to stop; every other outcome, including faults, returns `true`.
    pub async fn handle_event(&self, event: &Event) -> bool {
        debug!(
            kind = %event.kind(),
            correlation_id = event.correlation_id(),
            "handling event"
        );

        let outcome = match AssertUnwindSafe(self.dispatch(event)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(HandlerError::Panicked {
                info: panic_message(&*panic),
            }),
        };

        match outcome {
            Ok(flow) => flow.is_continue(),
            Err(e) => {
                error!(
                    kind = %event.kind(),
                    correlation_id = event.correlation_id(),
                    error = %e,
                    label = e.as_label(),
                    "error handling event"
                );
                !event.is_shutdown()
            }
        }
    }

    /// Emits an event on behalf of a job; returns false if it was not enqueued.
    pub fn emit_event(&self, event: Event) -> bool {
        emit_logged(&self.bus, event)
    }

    async fn dispatch(&self, event: &Event) -> Result<ControlFlow<()>, HandlerError> {
        match event.kind() {
            EventKind::JobStarted => self.on_job_started(event).await?,
            EventKind::JobCompleted | EventKind::JobFailed => self.on_job_finished(event).await?,
            EventKind::ShutdownRequested => {
                info!("shutdown requested, stopping event handler");
                return Ok(ControlFlow::Break(()));
            }
            other => {
                warn!(kind = %other, correlation_id = event.correlation_id(), "no handler for event");
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    async fn on_job_started(&self, event: &Event) -> Result<(), HandlerError> {
        let job_id = required_str(event, "job_id")?;
        info!(job_id, correlation_id = event.correlation_id(), "Job started: {job_id}");

        self.tracker
            .started(JobRun {
                job_id: job_id.to_string(),
                correlation_id: event.correlation_id().map(str::to_string),
                started_at: event.created_at(),
            })
            .await;
        Ok(())
    }

    async fn on_job_finished(&self, event: &Event) -> Result<(), HandlerError> {
        let job_id = required_str(event, "job_id")?;
        let elapsed_ms = self
            .tracker
            .finished(run_key(job_id, event.correlation_id()))
            .await
            .map(|run| (event.created_at() - run.started_at).num_milliseconds());

        if event.kind() == EventKind::JobFailed {
            warn!(
                job_id,
                elapsed_ms,
                error = event.str_field("error"),
                "Job failed: {job_id}"
            );
        } else {
            info!(job_id, elapsed_ms, "Job completed: {job_id}");
        }
        Ok(())
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Wraps a job so every run is reported on the bus.
struct Reporting {
    id: JobId,
    inner: JobRef,
    bus: Arc<EventBus>,
}

impl Reporting {
    fn event(&self, kind: EventKind, run_id: &str) -> Event {
        Event::new(kind)
            .with_field("job_id", self.id.as_str())
            .with_field("job_name", self.inner.name())
            .with_correlation_id(run_id)
    }
}

#[async_trait]
impl Job for Reporting {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), JobError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        emit_logged(&self.bus, self.event(EventKind::JobStarted, &run_id));

        let res = match AssertUnwindSafe(self.inner.run(ctx)).catch_unwind().await {
            Ok(res) => res,
            Err(panic) => Err(JobError::Panicked {
                info: panic_message(&*panic),
            }),
        };
        let done = match &res {
            Ok(()) => self.event(EventKind::JobCompleted, &run_id),
            Err(e) => self
                .event(EventKind::JobFailed, &run_id)
                .with_field("error", e.to_string())
                .with_field("error_label", e.as_label()),
        };
        emit_logged(&self.bus, done);
        res
    }
}

/// Enqueues `event`, logging the failure label when the bus rejects it.
fn emit_logged(bus: &EventBus, event: Event) -> bool {
    match bus.emit(event) {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, label = e.as_label(), "failed to emit event");
            false
        }
    }
}

fn required_str<'a>(event: &'a Event, field: &'static str) -> Result<&'a str, HandlerError> {
    match event.payload().get(field) {
        None => Err(HandlerError::MissingField { field }),
        Some(value) => value.as_str().ok_or(HandlerError::InvalidField {
            field,
            expected: "a string",
        }),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
