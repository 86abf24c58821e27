//! Error types for watchdog device and process lifecycle operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// How a disarm step tried to stop the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisarmMethod {
    /// `WDIOC_SETOPTIONS` with `WDIOS_DISABLECARD`.
    DisableCard,
    /// Writing the magic-close sentinel byte before closing.
    Sentinel,
}

impl DisarmMethod {
    /// Get the method as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DisableCard => "disable-card",
            Self::Sentinel => "sentinel write",
        }
    }
}

impl std::fmt::Display for DisarmMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while driving the watchdog device.
///
/// Only [`WatchdogError::OpenFailed`] and
/// [`WatchdogError::InvalidConfiguration`] stop the daemon. Every other
/// variant is logged and the keep-alive loop carries on.
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// The device node could not be opened.
    #[error("failed to open watchdog device {}: {source}", path.display())]
    OpenFailed {
        /// Device path that was tried.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },

    /// The requested timeout could not be applied to the device.
    #[error("failed to set watchdog timeout to {timeout_secs}s: {source}")]
    ConfigurationFailed {
        /// Requested timeout in seconds.
        timeout_secs: u32,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Reading device identity or timeout failed.
    #[error("failed to query watchdog {what}: {source}")]
    QueryFailed {
        /// What was being queried.
        what: &'static str,
        /// Underlying OS error.
        source: io::Error,
    },

    /// A keep-alive did not reach the device.
    #[error("watchdog keep-alive failed: {0}")]
    PingFailed(#[source] io::Error),

    /// One of the disarm steps failed; the device may still be armed.
    #[error("watchdog disarm via {method} failed: {source}")]
    DisarmFailed {
        /// Which disarm step failed.
        method: DisarmMethod,
        /// Underlying OS error.
        source: io::Error,
    },

    /// Closing the descriptor reported an error.
    #[error("failed to close watchdog device: {0}")]
    CloseFailed(#[source] io::Error),

    /// The device was used after it had been closed.
    #[error("watchdog device is closed")]
    DeviceClosed,

    /// Invalid configuration provided.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Controller state transition not allowed.
    #[error("invalid controller state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state.
        from: &'static str,
        /// Attempted target state.
        to: &'static str,
    },
}

impl WatchdogError {
    /// Create an open failure error.
    #[must_use]
    pub fn open_failed(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::OpenFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a disarm failure error.
    #[must_use]
    pub fn disarm_failed(method: DisarmMethod, source: io::Error) -> Self {
        Self::DisarmFailed { method, source }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(from: &'static str, to: &'static str) -> Self {
        Self::InvalidTransition { from, to }
    }

    /// Whether this error must stop the daemon.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed { .. } | Self::InvalidConfiguration(_) | Self::InvalidTransition { .. }
        )
    }
}

/// A specialized `Result` type for watchdog operations.
pub type WatchdogResult<T> = Result<T, WatchdogError>;

/// Errors raised while preparing the process around the controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `fork(2)` failed.
    #[error("failed to fork daemon process: {0}")]
    Fork(#[source] io::Error),

    /// `setsid(2)` failed.
    #[error("failed to create a new session: {0}")]
    Session(#[source] io::Error),

    /// Changing to the root directory failed.
    #[error("failed to change working directory to /: {0}")]
    ChangeDirectory(#[source] io::Error),

    /// Writing or removing the PID file failed.
    #[error("PID file {}: {source}", path.display())]
    PidFile {
        /// PID file location.
        path: PathBuf,
        /// Underlying OS error.
        source: io::Error,
    },
}

impl LifecycleError {
    /// Process exit status for fatal lifecycle errors.
    ///
    /// Returns `None` for PID-file errors, which are only warnings.
    #[must_use]
    pub fn exit_code(&self) -> Option<u8> {
        match self {
            Self::Fork(_) => Some(2),
            Self::Session(_) => Some(3),
            Self::ChangeDirectory(_) => Some(4),
            Self::PidFile { .. } => None,
        }
    }
}
