//! # Job abstraction.
//!
//! Defines the [`Job`] trait (async, cancelable) and [`JobRef`], an `Arc<dyn Job>` shared
//! between the engine and every run it starts.
//!
//! A job receives a [`CancellationToken`] that fires when the scheduler shuts down.
//! The engine never waits for a run to finish, so long jobs should check it.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// # Asynchronous, cancelable unit of scheduled work.
///
/// # Example
/// ```
/// use tokio_util::sync::CancellationToken;
/// use async_trait::async_trait;
/// use jobvisor::{Job, JobError};
///
/// struct Cleanup;
///
/// #[async_trait]
/// impl Job for Cleanup {
///     fn name(&self) -> &str { "cleanup" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<(), JobError> {
///         if ctx.is_cancelled() {
///             return Err(JobError::Canceled);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Returns a stable, human-readable job name.
    fn name(&self) -> &str;

    /// Executes one run of the job.
    async fn run(&self, ctx: CancellationToken) -> Result<(), JobError>;
}
