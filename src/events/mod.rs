//! Events: data model and the bounded bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`], [`Payload`] event classification and data
//! - [`EventBus`] bounded MPSC queue with lifecycle flags
//!
//! ## Quick reference
//! - **Producers**: `Coordinator::shutdown`, `JobScheduler::emit_event`, scheduled job runs.
//! - **Consumer**: the coordinator's consumer loop (`EventBus::listen`), exactly one.

mod bus;
mod event;

pub use bus::{DEFAULT_POLL_INTERVAL, DEFAULT_QUEUE_CAPACITY, EventBus};
pub use event::{Event, EventKind, Payload};
