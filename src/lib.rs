//! # jobvisor
//!
//! **Jobvisor** is an event-driven job coordination runtime.
//!
//! Producers (scheduled jobs, application code) enqueue [`Event`]s on a bounded
//! [`EventBus`]; a single consumer loop owned by the [`Coordinator`] drains the bus and
//! dispatches each event to the [`JobScheduler`], which runs jobs on interval, cron or
//! one-shot [`Trigger`]s and reports their progress back through the same bus.
//!
//! ## Architecture
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Job (tick)  │   │ Job (report) │   │  app code    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ JobStarted /     │                  │ emit(Event)
//!            │ JobCompleted /   │                  │
//!            │ JobFailed        │                  │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │            EventBus (bounded FIFO, drop-newest when full)         │
//! │               (capacity: CoordinatorConfig::queue_capacity)       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                       ┌────────────────────────┐
//!                       │   consumer loop        │
//!                       │   (in Coordinator)     │
//!                       └───────────┬────────────┘
//!                                   ▼
//!                    JobScheduler::handle_event(&Event)
//!                      ├─ JobStarted            ─► log + JobTracker
//!                      ├─ JobCompleted / Failed ─► log + JobTracker
//!                      ├─ ShutdownRequested     ─► stop consumer
//!                      └─ other                 ─► warn
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                |
//! |-------------------|--------------------------------------------------------------|------------------------------------------|
//! | **Events**        | Typed events with JSON payloads and correlation ids.         | [`Event`], [`EventKind`], [`Payload`]    |
//! | **Bus**           | Bounded queue with a readiness gate and a single listener.   | [`EventBus`]                             |
//! | **Jobs**          | Async jobs on interval/cron/date triggers.                   | [`Job`], [`JobFn`], [`Trigger`]          |
//! | **Scheduling**    | Registration, overlap limits, lifecycle event dispatch.      | [`JobScheduler`], [`JobOptions`]         |
//! | **Coordination**  | Startup, signal handling, graceful shutdown.                 | [`Coordinator`], [`LifecycleState`]      |
//! | **Configuration** | Environment and `.env` driven settings.                      | [`Settings`], [`CoordinatorConfig`]      |
//! | **Errors**        | Typed errors with stable log labels.                         | [`RuntimeError`], [`EmitError`], ...     |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{Coordinator, CoordinatorConfig, JobError, JobFn, JobOptions, Trigger};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = Coordinator::new(CoordinatorConfig::default());
//!
//!     let runner = {
//!         let coordinator = coordinator.clone();
//!         tokio::spawn(async move { coordinator.run().await })
//!     };
//!     assert!(coordinator.wait_until_running().await);
//!
//!     let hello = JobFn::arc("hello", |_ctx: CancellationToken| async move {
//!         println!("Hello from job!");
//!         Ok::<_, JobError>(())
//!     });
//!     coordinator
//!         .jobs()
//!         .add_job(hello, Trigger::interval(Duration::from_millis(50))?, JobOptions::default())
//!         .await?;
//!
//!     tokio::time::sleep(Duration::from_millis(120)).await;
//!     coordinator.shutdown().await;
//!     runner.await??;
//!     Ok(())
//! }
//! ```
mod config;
mod core;
mod error;
mod events;
mod jobs;
mod telemetry;

// ---- Public re-exports ----

pub use config::{AppEnv, ConfigError, CoordinatorConfig, Credentials, LogLevel, Settings};
pub use core::{Coordinator, LifecycleState, TerminationListener, TerminationSignal};
pub use error::{EmitError, HandlerError, JobError, RuntimeError, SchedulerError, TriggerError};
pub use events::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, Event, EventBus, EventKind, Payload};
pub use jobs::{
    Engine, Job, JobFn, JobId, JobOptions, JobRef, JobRun, JobScheduler, JobTracker, Trigger,
};
pub use telemetry::init_tracing;
