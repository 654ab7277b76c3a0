//! Error types used by the jobvisor runtime, the event bus and jobs.
//!
//! - [`RuntimeError`]: failures of the coordinator lifecycle itself (fatal to `run()`).
//! - [`EmitError`]: an event could not be enqueued; always recovered locally.
//! - [`HandlerError`]: dispatching a single event failed; caught by the consumer loop.
//! - [`SchedulerError`] / [`TriggerError`]: job registration failures.
//! - [`JobError`]: errors returned by individual job executions.
//!
//! Every enum provides `as_label` (stable snake_case string) for logs.

use std::time::Duration;
use thiserror::Error;

use crate::events::EventKind;

/// # Errors produced by the coordinator lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The event bus did not become ready within the allotted time.
    #[error("event bus not ready after {timeout:?}")]
    StartupTimeout {
        /// The configured startup timeout.
        timeout: Duration,
    },

    /// `run()` was called on a coordinator that already left the `Created` state.
    #[error("coordinator already started")]
    AlreadyStarted,

    /// OS signal handlers could not be installed.
    #[error("failed to install signal handlers: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::StartupTimeout { timeout: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_startup_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::StartupTimeout { .. } => "runtime_startup_timeout",
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Reasons an event was not enqueued.
///
/// Both variants are already logged by the bus when returned; callers may ignore them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    /// The bus is stopped (or was never started).
    #[error("event bus is not running, dropped {kind}")]
    NotRunning {
        /// Kind of the discarded event.
        kind: EventKind,
    },

    /// The queue is at capacity; the new event was dropped.
    #[error("event queue full (capacity {capacity}), dropped {kind}")]
    QueueFull {
        /// Kind of the discarded event.
        kind: EventKind,
        /// Configured queue capacity.
        capacity: usize,
    },
}

impl EmitError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitError::NotRunning { .. } => "emit_not_running",
            EmitError::QueueFull { .. } => "emit_queue_full",
        }
    }
}

/// # Faults raised while dispatching one event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A required payload key is absent.
    #[error("payload is missing `{field}`")]
    MissingField {
        /// Payload key.
        field: &'static str,
    },

    /// A payload key holds a value of the wrong type.
    #[error("payload field `{field}` must be {expected}")]
    InvalidField {
        /// Payload key.
        field: &'static str,
        /// Human-readable expected type.
        expected: &'static str,
    },

    /// The handler panicked.
    #[error("handler panicked: {info}")]
    Panicked {
        /// Panic message, if it was a string.
        info: String,
    },
}

impl HandlerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::MissingField { .. } => "handler_missing_field",
            HandlerError::InvalidField { .. } => "handler_invalid_field",
            HandlerError::Panicked { .. } => "handler_panicked",
        }
    }
}

/// # Job registration failures.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// The scheduler has not been started, or was shut down.
    #[error("job scheduler is not running")]
    NotRunning,

    /// A job with the same id exists and `replace_existing` was not set.
    #[error("job `{id}` already exists")]
    DuplicateJob {
        /// Conflicting job id.
        id: String,
    },

    /// The trigger will never fire.
    #[error("trigger for job `{id}` has no upcoming fire time")]
    NeverFires {
        /// Job id.
        id: String,
    },
}

impl SchedulerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SchedulerError::NotRunning => "scheduler_not_running",
            SchedulerError::DuplicateJob { .. } => "scheduler_duplicate_job",
            SchedulerError::NeverFires { .. } => "scheduler_never_fires",
        }
    }
}

/// # Invalid trigger definitions.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerError {
    /// The cron expression could not be parsed.
    #[error("invalid cron expression `{expr}`: {reason}")]
    InvalidCron {
        /// The rejected expression.
        expr: String,
        /// Parser message.
        reason: String,
    },

    /// Interval triggers need a non-zero period.
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

impl TriggerError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TriggerError::InvalidCron { .. } => "trigger_invalid_cron",
            TriggerError::ZeroInterval => "trigger_zero_interval",
        }
    }
}

/// # Errors produced by job execution.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum JobError {
    /// Job execution failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Job observed cancellation and stopped early.
    #[error("context cancelled")]
    Canceled,

    /// Job panicked; the panic was caught at the run boundary.
    #[error("job panicked: {info}")]
    Panicked {
        /// Panic message, if it was a string.
        info: String,
    },
}

impl JobError {
    /// Shorthand for [`JobError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        JobError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use jobvisor::JobError;
    ///
    /// assert_eq!(JobError::fail("boom").as_label(), "job_failed");
    /// assert_eq!(JobError::Canceled.as_label(), "job_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            JobError::Fail { .. } => "job_failed",
            JobError::Canceled => "job_canceled",
            JobError::Panicked { .. } => "job_panicked",
        }
    }
}
