//! Watchdog device access.
//!
//! [`WatchdogDriver`] is the seam between the daemon and the hardware: one
//! method per operation of the Linux watchdog API. [`DeviceHandle`] layers
//! the daemon's policy on top of a driver: only opening may fail hard,
//! everything else is best-effort and reported.

use crate::error::{DisarmMethod, WatchdogError, WatchdogResult};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Byte written before close to request a "magic close" disarm.
pub const SENTINEL_BYTE: u8 = b'V';

/// Identity reported by the query-capabilities operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceIdentity {
    /// Driver identity string.
    pub identity: String,
    /// Firmware version.
    pub firmware_version: u32,
    /// Supported `WDIOF_*` option bits.
    pub options: u32,
}

/// Low-level operations on an open watchdog device.
///
/// Implementations issue exactly one device operation per call and report
/// the raw outcome; retry and logging policy lives in [`DeviceHandle`].
pub trait WatchdogDriver: Send {
    /// Read identity and firmware version (`WDIOC_GETSUPPORT`).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the driver rejects the query.
    fn query_support(&mut self) -> io::Result<DeviceIdentity>;

    /// Request a new timeout (`WDIOC_SETTIMEOUT`).
    ///
    /// Returns the timeout the driver actually applied, which may be
    /// rounded.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the timeout was not applied.
    fn set_timeout(&mut self, timeout_secs: u32) -> io::Result<u32>;

    /// Read the active timeout (`WDIOC_GETTIMEOUT`).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the driver cannot report it.
    fn get_timeout(&mut self) -> io::Result<u32>;

    /// Reset the countdown (`WDIOC_KEEPALIVE`).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the keep-alive was not delivered.
    fn keep_alive(&mut self) -> io::Result<()>;

    /// Stop the timer (`WDIOC_SETOPTIONS` with `WDIOS_DISABLECARD`).
    ///
    /// # Errors
    ///
    /// Returns the OS error if the driver refused.
    fn disable_card(&mut self) -> io::Result<()>;

    /// Write a single byte to the device.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the byte was not written.
    fn write_sentinel(&mut self, byte: u8) -> io::Result<()>;

    /// Release the descriptor.
    ///
    /// # Errors
    ///
    /// Returns the OS error reported by `close(2)`. The descriptor is gone
    /// either way.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}

/// Opens drivers for a device path.
pub trait DriverOpener {
    /// Driver produced by this opener.
    type Driver: WatchdogDriver;

    /// Open the device write-only and close-on-exec.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the device cannot be opened.
    fn open(&self, path: &Path) -> io::Result<Self::Driver>;
}

/// What happened while opening and configuring the device.
#[derive(Debug, Default)]
pub struct OpenReport {
    /// Identity, if the query succeeded.
    pub identity: Option<DeviceIdentity>,
    /// Timeout the driver accepted, if set-timeout succeeded.
    pub applied_timeout_secs: Option<u32>,
    /// Timeout read back after set-timeout failed, if readable.
    pub device_timeout_secs: Option<u32>,
    /// Best-effort steps that failed.
    pub failures: Vec<WatchdogError>,
}

impl OpenReport {
    /// Timeout the device is actually running with, when known.
    #[must_use]
    pub fn effective_timeout_secs(&self) -> Option<u32> {
        self.applied_timeout_secs.or(self.device_timeout_secs)
    }

    /// Whether the requested timeout was applied.
    #[must_use]
    pub fn timeout_applied(&self) -> bool {
        self.applied_timeout_secs.is_some()
    }
}

/// What happened while closing the device.
#[derive(Debug)]
pub struct CloseReport {
    /// Whether a disarm was requested.
    pub disarm_requested: bool,
    /// Steps that failed; the descriptor was closed regardless.
    pub failures: Vec<WatchdogError>,
}

impl CloseReport {
    /// Whether every step succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether a requested disarm went through without any failed step.
    #[must_use]
    pub fn disarmed(&self) -> bool {
        self.disarm_requested
            && !self
                .failures
                .iter()
                .any(|e| matches!(e, WatchdogError::DisarmFailed { .. }))
    }
}

/// Exclusive owner of an open watchdog device.
///
/// The handle is closed at most once: by [`DeviceHandle::close`] or, failing
/// that, on drop. Dropping an open handle never disarms the device.
#[derive(Debug)]
pub struct DeviceHandle<D: WatchdogDriver> {
    path: PathBuf,
    timeout_secs: u32,
    driver: Option<D>,
    report: OpenReport,
}

impl<D: WatchdogDriver> DeviceHandle<D> {
    /// Open `path` and try to arm it with `timeout_secs`.
    ///
    /// The identity query and the timeout change are best-effort: failures
    /// are logged and kept in [`DeviceHandle::open_report`].
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::OpenFailed`] if the device cannot be opened.
    pub fn open<O>(opener: &O, path: &Path, timeout_secs: u32) -> WatchdogResult<Self>
    where
        O: DriverOpener<Driver = D>,
    {
        let mut driver = opener.open(path).map_err(|source| {
            error!(path = %path.display(), error = %source, "failed to open watchdog device");
            WatchdogError::open_failed(path, source)
        })?;

        let mut report = OpenReport::default();

        match driver.query_support() {
            Ok(identity) => {
                info!(
                    path = %path.display(),
                    driver = %identity.identity,
                    firmware_version = identity.firmware_version,
                    "watchdog device opened"
                );
                report.identity = Some(identity);
            }
            Err(source) => {
                warn!(path = %path.display(), error = %source, "watchdog identity query failed");
                report.failures.push(WatchdogError::QueryFailed {
                    what: "support",
                    source,
                });
            }
        }

        match driver.set_timeout(timeout_secs) {
            Ok(applied) => {
                if applied == timeout_secs {
                    info!(timeout_secs, "watchdog timeout set");
                } else {
                    warn!(
                        requested_secs = timeout_secs,
                        applied_secs = applied,
                        "watchdog driver adjusted the requested timeout"
                    );
                }
                report.applied_timeout_secs = Some(applied);
            }
            Err(source) => {
                error!(
                    timeout_secs,
                    error = %source,
                    "failed to set watchdog timeout, keeping the device default"
                );
                report.failures.push(WatchdogError::ConfigurationFailed {
                    timeout_secs,
                    source,
                });
                match driver.get_timeout() {
                    Ok(current) => {
                        info!(device_timeout_secs = current, "watchdog keeps its previous timeout");
                        report.device_timeout_secs = Some(current);
                    }
                    Err(source) => {
                        debug!(error = %source, "watchdog timeout is not readable");
                        report.failures.push(WatchdogError::QueryFailed {
                            what: "timeout",
                            source,
                        });
                    }
                }
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            timeout_secs,
            driver: Some(driver),
            report,
        })
    }

    /// Send one keep-alive.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::PingFailed`] if the driver rejected it, or
    /// [`WatchdogError::DeviceClosed`] after [`DeviceHandle::close`].
    pub fn ping(&mut self) -> WatchdogResult<()> {
        let driver = self.driver.as_mut().ok_or(WatchdogError::DeviceClosed)?;
        driver.keep_alive().map_err(WatchdogError::PingFailed)
    }

    /// Close the device, optionally disarming it first.
    ///
    /// With `disarm`, both the disable-card request and the sentinel write
    /// are attempted even if the other fails. The descriptor is closed in
    /// every case. Returns `None` if the handle was already closed.
    pub fn close(&mut self, disarm: bool) -> Option<CloseReport> {
        let mut driver = self.driver.take()?;
        let mut failures = Vec::new();

        if disarm {
            if let Err(source) = driver.disable_card() {
                error!(error = %source, "watchdog disable-card request failed");
                failures.push(WatchdogError::disarm_failed(DisarmMethod::DisableCard, source));
            }
            if let Err(source) = driver.write_sentinel(SENTINEL_BYTE) {
                error!(
                    error = %source,
                    "sentinel write failed, the watchdog might still be active"
                );
                failures.push(WatchdogError::disarm_failed(DisarmMethod::Sentinel, source));
            }
        }

        if let Err(source) = driver.close() {
            error!(path = %self.path.display(), error = %source, "failed to close watchdog device");
            failures.push(WatchdogError::CloseFailed(source));
        }

        if !disarm {
            info!(path = %self.path.display(), "watchdog device closed, left armed");
        } else if failures.is_empty() {
            info!(path = %self.path.display(), "watchdog device disarmed and closed");
        }

        Some(CloseReport {
            disarm_requested: disarm,
            failures,
        })
    }

    /// Whether the descriptor is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// Device path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Timeout that was requested at open.
    #[must_use]
    pub fn requested_timeout_secs(&self) -> u32 {
        self.timeout_secs
    }

    /// Outcome of the best-effort steps performed by [`DeviceHandle::open`].
    #[must_use]
    pub fn open_report(&self) -> &OpenReport {
        &self.report
    }
}

impl<D: WatchdogDriver> Drop for DeviceHandle<D> {
    fn drop(&mut self) {
        if self.is_open() {
            warn!(path = %self.path.display(), "watchdog handle dropped while open");
            if let Some(report) = self.close(false) {
                debug!(clean = report.is_clean(), "watchdog closed on drop");
            }
        }
    }
}
