//! # Jobs: definitions, triggers, the time-based engine and the event-facing scheduler.
//!
//! - [`Job`] - trait for async cancelable jobs
//! - [`JobFn`] - closure-backed job
//! - [`JobRef`] - shared reference to a job (`Arc<dyn Job>`)
//! - [`Trigger`] - interval / cron / date fire schedule
//! - [`Engine`] - fires jobs on their triggers
//! - [`JobScheduler`] - engine + event handling and emission
//! - [`JobTracker`] - in-flight runs as seen through events

mod engine;
mod job;
mod job_fn;
mod scheduler;
mod tracker;
mod trigger;

pub use engine::{Engine, JobId, JobOptions};
pub use job::{Job, JobRef};
pub use job_fn::JobFn;
pub use scheduler::JobScheduler;
pub use tracker::{JobRun, JobTracker};
pub use trigger::Trigger;
