//! # Job run tracker driven by dispatched events.
//!
//! Keeps the set of job runs that reported `JobStarted` but not yet `JobCompleted`
//! or `JobFailed`, as seen by the consumer loop.
//!
//! ## Architecture
//! ```text
//! EventBus ──► consumer loop ──► JobScheduler::handle_event ──► JobTracker::started/finished
//!                                                                      │
//!                                                                      ▼
//!                                                      HashMap<run key, JobRun>
//! ```
//!
//! ## Rules
//! - A run is keyed by its correlation id (one per run); runs without one fall back to `job_id`
//! - Overlapping runs of one job are tracked separately as long as they carry correlation ids
//! - Reads (`snapshot`, `is_running`) are eventually consistent with job execution

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// One in-flight job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    /// Job identifier from the event payload.
    pub job_id: String,
    /// Correlation id of the `JobStarted` event.
    pub correlation_id: Option<String>,
    /// Creation time of the `JobStarted` event.
    pub started_at: DateTime<Utc>,
}

impl JobRun {
    /// Tracker key: the correlation id, or the job id when the run has none.
    pub fn key(&self) -> &str {
        run_key(&self.job_id, self.correlation_id.as_deref())
    }
}

/// Tracker key for a run of `job_id` reported under `correlation_id`.
pub(crate) fn run_key<'a>(job_id: &'a str, correlation_id: Option<&'a str>) -> &'a str {
    correlation_id.unwrap_or(job_id)
}

/// Thread-safe record of in-flight job runs.
#[derive(Debug, Default)]
pub struct JobTracker {
    runs: RwLock<HashMap<String, JobRun>>,
}

impl JobTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a started run.
    pub async fn started(&self, run: JobRun) {
        self.runs.write().await.insert(run.key().to_string(), run);
    }

    /// Clears the run stored under `key`; returns it if it was tracked.
    pub async fn finished(&self, key: &str) -> Option<JobRun> {
        self.runs.write().await.remove(key)
    }

    /// Returns in-flight runs sorted by job id, then start time.
    pub async fn snapshot(&self) -> Vec<JobRun> {
        let runs = self.runs.read().await;
        let mut out: Vec<JobRun> = runs.values().cloned().collect();
        out.sort_unstable_by(|a, b| {
            a.job_id
                .cmp(&b.job_id)
                .then_with(|| a.started_at.cmp(&b.started_at))
        });
        out
    }

    /// Returns true if any run of `job_id` is in flight.
    pub async fn is_running(&self, job_id: &str) -> bool {
        self.runs.read().await.values().any(|r| r.job_id == job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(id: &str, correlation_id: Option<&str>) -> JobRun {
        JobRun {
            job_id: id.to_string(),
            correlation_id: correlation_id.map(str::to_string),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_started_then_finished() {
        let tracker = JobTracker::new();
        tracker.started(run("b", None)).await;
        tracker.started(run("a", None)).await;

        let ids: Vec<String> = tracker.snapshot().await.into_iter().map(|r| r.job_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        assert!(tracker.finished("a").await.is_some());
        assert!(!tracker.is_running("a").await);
        assert!(tracker.is_running("b").await);
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_tracked_separately() {
        let tracker = JobTracker::new();
        tracker.started(run("x", Some("r1"))).await;
        tracker.started(run("x", Some("r2"))).await;
        assert_eq!(tracker.snapshot().await.len(), 2);

        let done = tracker.finished("r1").await.unwrap();
        assert_eq!(done.correlation_id.as_deref(), Some("r1"));

        let left = tracker.snapshot().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].key(), "r2");
        assert!(tracker.is_running("x").await);
    }

    #[tokio::test]
    async fn test_finishing_unknown_run_is_none() {
        let tracker = JobTracker::new();
        assert!(tracker.finished("ghost").await.is_none());
    }
}
