//! Process context for the daemon: detaching from the terminal and the PID
//! file.
//!
//! [`daemonize`] forks, so it must run before any thread (including a Tokio
//! runtime) is started.

#![expect(unsafe_code, reason = "fork(2), setsid(2), umask(2) and dup2(2) go through libc")]

use crate::error::LifecycleError;
use std::fs::OpenOptions;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default PID file location.
pub const DEFAULT_PID_FILE: &str = "/var/run/wdogd.pid";

/// Which side of the fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Daemonized {
    /// The calling process; it should exit successfully.
    Parent {
        /// PID of the detached child.
        child: u32,
    },
    /// The detached daemon process; it should carry on.
    Child,
}

/// Detach from the controlling terminal.
///
/// Forks; in the child, clears the umask, starts a new session, changes to
/// `/` and points the standard streams at `/dev/null`. Failing to redirect
/// the streams is only logged.
///
/// # Errors
///
/// Returns [`LifecycleError::Fork`], [`LifecycleError::Session`] or
/// [`LifecycleError::ChangeDirectory`].
pub fn daemonize() -> Result<Daemonized, LifecycleError> {
    // SAFETY: the caller guarantees the process is still single-threaded, so
    // the child inherits a consistent address space.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(LifecycleError::Fork(io::Error::last_os_error()));
    }
    if pid > 0 {
        return Ok(Daemonized::Parent {
            child: u32::try_from(pid).unwrap_or_default(),
        });
    }

    // SAFETY: umask only replaces the process file mode mask and cannot fail.
    unsafe { libc::umask(0) };

    // SAFETY: setsid takes no arguments; failure is reported through errno.
    let sid = unsafe { libc::setsid() };
    if sid < 0 {
        return Err(LifecycleError::Session(io::Error::last_os_error()));
    }

    std::env::set_current_dir("/").map_err(LifecycleError::ChangeDirectory)?;

    redirect_standard_streams();
    Ok(Daemonized::Child)
}

fn redirect_standard_streams() {
    let null = match OpenOptions::new().read(true).write(true).open("/dev/null") {
        Ok(file) => file,
        Err(e) => {
            warn!(error = %e, "cannot open /dev/null, standard streams left attached");
            return;
        }
    };

    for fd in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
        // SAFETY: both descriptors are valid for the duration of the call;
        // dup2 atomically replaces `fd` with a copy of the /dev/null descriptor.
        let rc = unsafe { libc::dup2(null.as_raw_fd(), fd) };
        if rc < 0 {
            warn!(fd, error = %io::Error::last_os_error(), "failed to redirect standard stream");
        }
    }
}

/// A PID file owned by the running daemon.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write the current process id to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PidFile`] if the file cannot be written.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, LifecycleError> {
        let path = path.into();
        std::fs::write(&path, std::process::id().to_string()).map_err(|source| {
            LifecycleError::PidFile {
                path: path.clone(),
                source,
            }
        })?;
        debug!(path = %path.display(), "PID file written");
        Ok(Self { path })
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PidFile`] if the file cannot be removed.
    pub fn remove(self) -> Result<(), LifecycleError> {
        std::fs::remove_file(&self.path).map_err(|source| LifecycleError::PidFile {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "PID file removed");
        Ok(())
    }
}
