//! # Time-based job engine.
//!
//! [`Engine`] fires registered jobs according to their [`Trigger`]. It knows nothing about
//! events; the [`JobScheduler`](crate::JobScheduler) wraps jobs before handing them over.
//!
//! ## Architecture
//! ```text
//! add_job(job, trigger, options)
//!     └─► driver task (one per job, child of the engine token)
//!            loop {
//!              next = trigger.next_fire(now, last)   (None → exhausted, remove job)
//!              sleep until next                       (cancellable)
//!              try_acquire instance slot              (busy → skip this fire)
//!              spawn job.run(child token)             (never awaited by the driver)
//!            }
//! ```
//!
//! ## Rules
//! - `shutdown()` cancels every driver and run token and returns immediately; in-flight
//!   runs are not awaited.
//! - A job never runs more than `max_instances` times concurrently; extra fires are skipped.
//! - Job ids are unique; re-registering an id needs `replace_existing`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, warn};

use crate::error::SchedulerError;
use crate::jobs::{JobRef, Trigger};

/// Job identifier.
pub type JobId = String;

/// Per-job registration options.
#[derive(Clone, Debug)]
pub struct JobOptions {
    /// Explicit id; generated (uuid v4) when `None`.
    pub id: Option<JobId>,
    /// Display name; defaults to [`Job::name`](crate::Job::name).
    pub name: Option<String>,
    /// Maximum concurrent runs of this job (min 1).
    pub max_instances: usize,
    /// Replace an existing job with the same id instead of failing.
    pub replace_existing: bool,
}

impl Default for JobOptions {
    /// `max_instances = 1`, generated id, no replacement.
    fn default() -> Self {
        Self {
            id: None,
            name: None,
            max_instances: 1,
            replace_existing: false,
        }
    }
}

impl JobOptions {
    /// Sets the job id.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the concurrency cap.
    pub fn with_max_instances(mut self, n: usize) -> Self {
        self.max_instances = n;
        self
    }

    /// Allows replacing a job with the same id.
    pub fn replace_existing(mut self) -> Self {
        self.replace_existing = true;
        self
    }
}

struct Registration {
    generation: u64,
    name: String,
    trigger: Trigger,
    token: CancellationToken,
}

#[derive(Default)]
struct EngineState {
    root: Option<CancellationToken>,
    jobs: HashMap<JobId, Registration>,
    generation: u64,
}

/// Interval/cron/date job engine on top of tokio timers.
#[derive(Default)]
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
}

impl Engine {
    /// Creates a stopped engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts accepting jobs. Idempotent.
    pub async fn start(&self) {
        let mut state = self.state.lock().await;
        if state.root.is_some() {
            debug!("job engine already started");
            return;
        }
        state.root = Some(CancellationToken::new());
        info!("job engine started");
    }

    /// Stops all drivers and signals in-flight runs to cancel, without waiting for them.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let Some(root) = state.root.take() else {
            debug!("job engine not running");
            return;
        };
        root.cancel();
        let dropped = state.jobs.len();
        state.jobs.clear();
        info!(jobs = dropped, "job engine stopped");
    }

    /// Returns true between `start()` and `shutdown()`.
    pub async fn is_running(&self) -> bool {
        self.state.lock().await.root.is_some()
    }

    /// Registers a job and spawns its driver.
    pub async fn add_job(
        &self,
        job: JobRef,
        trigger: Trigger,
        options: JobOptions,
    ) -> Result<JobId, SchedulerError> {
        let mut state = self.state.lock().await;
        let Some(root) = state.root.clone() else {
            return Err(SchedulerError::NotRunning);
        };

        let id = options
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        if trigger.next_fire(Utc::now(), None).is_none() {
            return Err(SchedulerError::NeverFires { id });
        }
        if let Some(existing) = state.jobs.get(&id) {
            if !options.replace_existing {
                return Err(SchedulerError::DuplicateJob { id });
            }
            existing.token.cancel();
            debug!(job_id = %id, "replacing existing job");
        }

        state.generation += 1;
        let generation = state.generation;
        let name = options.name.unwrap_or_else(|| job.name().to_string());
        let token = root.child_token();
        let max_instances = options.max_instances.max(1);

        let driver = Driver {
            id: id.clone(),
            generation,
            job,
            trigger: trigger.clone(),
            max_instances,
            slots: Arc::new(Semaphore::new(max_instances)),
            token: token.clone(),
            state: Arc::clone(&self.state),
        };
        tokio::spawn(driver.run().in_current_span());

        info!(job_id = %id, job_name = %name, %trigger, "job added");
        state.jobs.insert(
            id.clone(),
            Registration {
                generation,
                name,
                trigger,
                token,
            },
        );
        Ok(id)
    }

    /// Unschedules a job. Runs already in flight are cancelled but not awaited.
    pub async fn remove_job(&self, id: &str) -> bool {
        match self.state.lock().await.jobs.remove(id) {
            Some(reg) => {
                reg.token.cancel();
                info!(job_id = %id, job_name = %reg.name, "job removed");
                true
            }
            None => false,
        }
    }

    /// Returns registered job ids, sorted.
    pub async fn job_ids(&self) -> Vec<JobId> {
        let state = self.state.lock().await;
        let mut ids: Vec<JobId> = state.jobs.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the trigger registered for `id`.
    pub async fn trigger_of(&self, id: &str) -> Option<Trigger> {
        self.state
            .lock()
            .await
            .jobs
            .get(id)
            .map(|reg| reg.trigger.clone())
    }
}

/// Fires one job according to its trigger.
struct Driver {
    id: JobId,
    generation: u64,
    job: JobRef,
    trigger: Trigger,
    max_instances: usize,
    slots: Arc<Semaphore>,
    token: CancellationToken,
    state: Arc<Mutex<EngineState>>,
}

impl Driver {
    async fn run(self) {
        let mut last = None;

        loop {
            let now = Utc::now();
            let Some(next) = self.trigger.next_fire(now, last) else {
                debug!(job_id = %self.id, "trigger exhausted");
                self.unregister().await;
                break;
            };
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            last = Some(next);
            self.fire();
        }
    }

    fn fire(&self) {
        let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
            warn!(
                job_id = %self.id,
                max_instances = self.max_instances,
                "maximum number of running instances reached, run skipped"
            );
            return;
        };

        let job = Arc::clone(&self.job);
        let ctx = self.token.child_token();
        let id = self.id.clone();
        tokio::spawn(
            async move {
                let _permit = permit;
                debug!(job_id = %id, "job run started");
                if let Err(e) = job.run(ctx).await {
                    warn!(job_id = %id, error = %e, label = e.as_label(), "job run failed");
                }
            }
            .in_current_span(),
        );
    }

    /// Removes this registration unless it was replaced meanwhile.
    async fn unregister(&self) {
        let mut state = self.state.lock().await;
        if state
            .jobs
            .get(&self.id)
            .is_some_and(|reg| reg.generation == self.generation)
        {
            state.jobs.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::TimeDelta;

    use super::*;
    use crate::error::JobError;
    use crate::jobs::JobFn;

    fn counting(name: &'static str, runs: Arc<AtomicU32>) -> JobRef {
        JobFn::arc(name, move |_ctx: CancellationToken| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, JobError>(())
            }
        })
    }

    #[tokio::test]
    async fn test_add_job_requires_started_engine() {
        let engine = Engine::new();
        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::interval(Duration::from_millis(10)).unwrap();

        let err = engine
            .add_job(counting("t", runs), trigger, JobOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, SchedulerError::NotRunning);
    }

    #[tokio::test]
    async fn test_interval_job_fires_repeatedly() {
        let engine = Engine::new();
        engine.start().await;

        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::interval(Duration::from_millis(20)).unwrap();
        engine
            .add_job(counting("tick", runs.clone()), trigger, JobOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(runs.load(Ordering::SeqCst) >= 3);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_firing() {
        let engine = Engine::new();
        engine.start().await;

        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::interval(Duration::from_millis(20)).unwrap();
        engine
            .add_job(counting("tick", runs.clone()), trigger, JobOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(70)).await;
        engine.shutdown().await;
        let after_shutdown = runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_shutdown);
        assert!(engine.job_ids().await.is_empty());
        assert!(!engine.is_running().await);
    }

    #[tokio::test]
    async fn test_duplicate_id_needs_replace_existing() {
        let engine = Engine::new();
        engine.start().await;
        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::interval(Duration::from_secs(60)).unwrap();
        let opts = JobOptions::default().with_id("report");

        engine
            .add_job(counting("r", runs.clone()), trigger.clone(), opts.clone())
            .await
            .unwrap();
        let err = engine
            .add_job(counting("r", runs.clone()), trigger.clone(), opts.clone())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SchedulerError::DuplicateJob {
                id: "report".into()
            }
        );

        let id = engine
            .add_job(counting("r", runs), trigger, opts.replace_existing())
            .await
            .unwrap();
        assert_eq!(id, "report");
        assert_eq!(engine.job_ids().await, vec!["report"]);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_date_job_runs_once_and_unregisters() {
        let engine = Engine::new();
        engine.start().await;
        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::at(Utc::now() + TimeDelta::milliseconds(20));

        engine
            .add_job(
                counting("once", runs.clone()),
                trigger,
                JobOptions::default().with_id("once"),
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(engine.job_ids().await.is_empty());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_skipped() {
        let engine = Engine::new();
        engine.start().await;

        let started = Arc::new(AtomicU32::new(0));
        let counter = started.clone();
        let slow: JobRef = JobFn::arc("slow", move |ctx: CancellationToken| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                ctx.cancelled().await;
                Err::<(), _>(JobError::Canceled)
            }
        });
        let trigger = Trigger::interval(Duration::from_millis(10)).unwrap();
        engine
            .add_job(slow, trigger, JobOptions::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(started.load(Ordering::SeqCst), 1);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_remove_job() {
        let engine = Engine::new();
        engine.start().await;
        let runs = Arc::new(AtomicU32::new(0));
        let trigger = Trigger::interval(Duration::from_secs(60)).unwrap();

        let id = engine
            .add_job(counting("r", runs), trigger, JobOptions::default())
            .await
            .unwrap();
        assert!(engine.trigger_of(&id).await.is_some());
        assert!(engine.remove_job(&id).await);
        assert!(!engine.remove_job(&id).await);
        engine.shutdown().await;
    }
}
