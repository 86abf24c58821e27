//! Termination signal handling.
//!
//! The bridge never touches the device: it only raises the shutdown flag and
//! lets the controller run the close/disarm sequence on its own path.

use crate::shutdown::ShutdownTrigger;
use std::io;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::info;

/// Turns `SIGTERM` and `SIGINT` into a shutdown request.
///
/// Dropping the bridge stops listening.
#[derive(Debug)]
pub struct SignalBridge {
    task: JoinHandle<()>,
}

impl SignalBridge {
    /// Register the handlers and start forwarding signals to `trigger`.
    ///
    /// Registration happens before this returns, so a signal delivered right
    /// afterwards is never lost. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the OS error if a handler cannot be registered.
    pub fn install(trigger: ShutdownTrigger) -> io::Result<Self> {
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        let task = tokio::spawn(async move {
            let name = tokio::select! {
                _ = sigterm.recv() => "SIGTERM",
                _ = sigint.recv() => "SIGINT",
            };
            info!(signal = name, "termination signal received, stopping watchdog daemon");
            trigger.request();
        });

        Ok(Self { task })
    }

    /// Whether a signal has already been forwarded.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SignalBridge {
    fn drop(&mut self) {
        self.task.abort();
    }
}
