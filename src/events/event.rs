//! # Events exchanged between the coordinator, the job scheduler and jobs.
//!
//! The [`EventKind`] enum classifies events into two groups:
//! - **Job events**: lifecycle of scheduled job runs and company processing work
//! - **Control events**: [`EventKind::ShutdownRequested`], which stops the consumer loop
//!
//! An [`Event`] is built once and then only read: fields are private and exposed
//! through accessors. `created_at` is taken from the wall clock at construction;
//! there is no global ordering between events built concurrently.
//!
//! ## Example
//! ```rust
//! use jobvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::JobStarted)
//!     .with_field("job_id", "abc")
//!     .with_correlation_id("c1");
//!
//! assert_eq!(ev.kind(), EventKind::JobStarted);
//! assert_eq!(ev.payload()["job_id"], "abc");
//! assert_eq!(ev.correlation_id(), Some("c1"));
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event payload: string keys to arbitrary JSON values.
pub type Payload = serde_json::Map<String, Value>;

/// Classification of events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EventKind {
    // === Job lifecycle ===
    /// A job run began.
    ///
    /// Payload: `job_id` (string), `job_name` (string, when emitted by the scheduler).
    JobStarted,

    /// A job run finished successfully.
    ///
    /// Payload: `job_id`, `job_name`.
    JobCompleted,

    /// A job run returned an error.
    ///
    /// Payload: `job_id`, `job_name`, `error`.
    JobFailed,

    // === Company processing ===
    /// Request to process one company.
    ProcessCompany,
    /// A company was processed.
    CompanyProcessed,
    /// Processing a company failed.
    CompanyFailed,

    // === Control ===
    /// Shutdown requested; the consumer loop stops when it dispatches this event.
    ShutdownRequested,
}

impl EventKind {
    /// Stable wire name (snake_case).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::JobStarted => "job_started",
            EventKind::JobCompleted => "job_completed",
            EventKind::JobFailed => "job_failed",
            EventKind::ProcessCompany => "process_company",
            EventKind::CompanyProcessed => "company_processed",
            EventKind::CompanyFailed => "company_failed",
            EventKind::ShutdownRequested => "shutdown_requested",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable event value.
///
/// - `kind`: event classification
/// - `payload`: arbitrary key/value data, empty by default
/// - `created_at`: wall-clock construction time
/// - `correlation_id`: optional opaque id grouping related events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    #[serde(default)]
    payload: Payload,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with an empty payload and the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            payload: Payload::new(),
            created_at: Utc::now(),
            correlation_id: None,
        }
    }

    /// Replaces the payload.
    #[inline]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Adds one payload entry.
    #[inline]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Attaches a correlation id.
    #[inline]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Event classification.
    #[inline]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Payload map.
    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Construction timestamp.
    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Correlation id, if any.
    #[inline]
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the payload value under `key` when it is a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    #[inline]
    pub fn is_shutdown(&self) -> bool {
        matches!(self.kind, EventKind::ShutdownRequested)
    }
}
