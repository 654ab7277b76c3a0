//! Runtime core: the [`Coordinator`] and OS signal handling.
//!
//! - [`coordinator`]: owns the bus and scheduler, runs the consumer loop, drives shutdown;
//! - [`shutdown`]: cross-platform termination signal handling.

mod coordinator;
mod shutdown;

pub use coordinator::{Coordinator, LifecycleState};
pub use shutdown::{TerminationListener, TerminationSignal};
