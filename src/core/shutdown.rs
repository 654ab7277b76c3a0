//! # OS termination signals.
//!
//! [`TerminationListener::install`] registers the handlers synchronously, so a signal that
//! arrives any time after installation is queued instead of killing the process. The
//! listener then reports which signal arrived, so the coordinator can log it before
//! shutting down.
//!
//! **Unix:** `SIGINT` (Ctrl-C in terminal) and `SIGTERM` (default kill signal, used by
//! systemd/Kubernetes).
//!
//! **Other platforms:** `Ctrl-C`.

use std::fmt;

/// Termination signal received by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl TerminationSignal {
    /// Conventional signal name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TerminationSignal::Interrupt => "SIGINT",
            TerminationSignal::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installed termination signal handlers.
///
/// Must be created inside a tokio runtime.
#[cfg(unix)]
#[derive(Debug)]
pub struct TerminationListener {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationListener {
    /// Registers `SIGINT` and `SIGTERM` handlers; `Err` means registration failed.
    pub fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next termination signal.
    ///
    /// Returns `None` if the signal driver shut down.
    pub async fn recv(&mut self) -> Option<TerminationSignal> {
        tokio::select! {
            got = self.sigint.recv() => got.map(|()| TerminationSignal::Interrupt),
            got = self.sigterm.recv() => got.map(|()| TerminationSignal::Terminate),
        }
    }
}

/// Installed termination signal handlers.
///
/// Must be created inside a tokio runtime.
#[cfg(not(unix))]
#[derive(Debug)]
pub struct TerminationListener {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(not(unix))]
impl TerminationListener {
    /// Registers the Ctrl-C handler; `Err` means registration failed.
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    /// Waits for the next Ctrl-C.
    ///
    /// Returns `None` if the signal driver shut down.
    pub async fn recv(&mut self) -> Option<TerminationSignal> {
        self.ctrl_c.recv().await.map(|()| TerminationSignal::Interrupt)
    }
}
