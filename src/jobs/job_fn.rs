//! # Function-backed job (`JobFn`)
//!
//! [`JobFn`] wraps a closure `F: Fn(CancellationToken) -> Fut` and produces a fresh future
//! per run. State shared between runs must be captured explicitly (e.g. `Arc<AtomicU64>`).
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use jobvisor::{JobFn, JobRef, JobError};
//!
//! let j: JobRef = JobFn::arc("heartbeat", |_ctx: CancellationToken| async move {
//!     Ok::<_, JobError>(())
//! });
//!
//! assert_eq!(j.name(), "heartbeat");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::JobError;
use crate::jobs::job::Job;

/// Function-backed job implementation.
pub struct JobFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> JobFn<F> {
    /// Creates a new function-backed job.
    ///
    /// Prefer [`JobFn::arc`] when you immediately need a [`JobRef`](crate::JobRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the job and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> std::fmt::Debug for JobFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobFn").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<(), JobError> {
        (self.f)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::jobs::JobRef;

    #[tokio::test]
    async fn test_each_run_builds_a_fresh_future() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let job: JobRef = JobFn::arc("count", move |_ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, JobError>(())
            }
        });

        job.run(CancellationToken::new()).await.unwrap();
        job.run(CancellationToken::new()).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_passed_through() {
        let job = JobFn::new("broken", |_ctx: CancellationToken| async {
            Err::<(), _>(JobError::fail("disk full"))
        });

        let err = job.run(CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "execution failed: disk full");
    }
}
