//! Process-wide shutdown flag.
//!
//! A one-way `false -> true` flag built on [`tokio::sync::watch`]. The
//! trigger side is handed to the signal bridge; the listener side is owned by
//! the controller, which reads it once per loop iteration and races it
//! against the interval sleep.

use std::sync::Arc;
use tokio::sync::watch;

/// Create a connected trigger/listener pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownListener) {
    let (tx, rx) = watch::channel(false);
    (
        ShutdownTrigger { tx: Arc::new(tx) },
        ShutdownListener { rx },
    )
}

/// Requests shutdown. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Raise the flag.
    ///
    /// Returns `true` if this call raised it, `false` if it was already set.
    pub fn request(&self) -> bool {
        self.tx.send_if_modified(|requested| {
            if *requested {
                false
            } else {
                *requested = true;
                true
            }
        })
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Create another listener on the same flag.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Observes the shutdown flag.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is requested.
    ///
    /// If every trigger is dropped without requesting shutdown this never
    /// completes: losing the signal bridge must not stop the keep-alive.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|requested| *requested).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
