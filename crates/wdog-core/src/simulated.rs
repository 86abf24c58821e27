//! Simulated watchdog device.
//!
//! [`SimulatedWatchdog`] stands in for `/dev/watchdog` in tests and
//! hardware-free environments. It records every operation it receives,
//! models the armed/disarmed state of a kernel watchdog with "magic close"
//! support, and can inject failures per operation.

use crate::device::{DeviceIdentity, DriverOpener, SENTINEL_BYTE, WatchdogDriver};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Timeout a freshly opened simulated device runs with.
pub const SIMULATED_DEFAULT_TIMEOUT_SECS: u32 = 60;

/// One operation received by the simulated device, in arrival order.
///
/// Failed attempts are recorded too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceOp {
    /// Device opened.
    Open(PathBuf),
    /// Identity queried.
    QuerySupport,
    /// Timeout change requested.
    SetTimeout(u32),
    /// Timeout read back.
    GetTimeout,
    /// Keep-alive.
    KeepAlive,
    /// Disable-card request.
    DisableCard,
    /// Byte written.
    Write(u8),
    /// Descriptor closed.
    Close,
}

/// Operation at which a failure can be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Opening the device.
    Open,
    /// Identity query.
    QuerySupport,
    /// Timeout change.
    SetTimeout,
    /// Timeout read-back.
    GetTimeout,
    /// Keep-alive.
    KeepAlive,
    /// Disable-card request.
    DisableCard,
    /// Sentinel write.
    Write,
    /// Descriptor close.
    Close,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Times(u32),
    Always,
}

#[derive(Debug)]
struct Inner {
    ops: Vec<DeviceOp>,
    faults: HashMap<FaultPoint, Fault>,
    identity: DeviceIdentity,
    timeout_secs: u32,
    max_timeout_secs: Option<u32>,
    armed: bool,
    open: bool,
}

impl Inner {
    fn take_fault(&mut self, point: FaultPoint) -> io::Result<()> {
        match self.faults.get(&point).copied() {
            None => Ok(()),
            Some(Fault::Always) => Err(injected(point)),
            Some(Fault::Times(n)) => {
                if n <= 1 {
                    self.faults.remove(&point);
                } else {
                    self.faults.insert(point, Fault::Times(n - 1));
                }
                Err(injected(point))
            }
        }
    }
}

fn injected(point: FaultPoint) -> io::Error {
    io::Error::other(format!("injected fault at {point:?}"))
}

/// Recording, fault-injecting stand-in for a watchdog device.
///
/// Clones share the same device: keep one clone in the test and hand another
/// to [`WatchdogController::start`](crate::WatchdogController::start) as the
/// opener.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use wdog_core::prelude::*;
///
/// let device = SimulatedWatchdog::new();
/// let mut handle = DeviceHandle::open(&device, Path::new("/dev/watchdog"), 10)?;
/// handle.ping()?;
/// handle.close(false);
///
/// assert!(device.is_armed());
/// assert_eq!(device.timeout_secs(), 10);
/// # Ok::<(), WatchdogError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedWatchdog {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedWatchdog {
    /// Create a closed, disarmed simulated device.
    #[must_use]
    pub fn new() -> Self {
        Self::with_identity(DeviceIdentity {
            identity: "Software Watchdog".to_string(),
            firmware_version: 0,
            options: 0x8180,
        })
    }

    /// Create a simulated device reporting `identity`.
    #[must_use]
    pub fn with_identity(identity: DeviceIdentity) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                ops: Vec::new(),
                faults: HashMap::new(),
                identity,
                timeout_secs: SIMULATED_DEFAULT_TIMEOUT_SECS,
                max_timeout_secs: None,
                armed: false,
                open: false,
            })),
        }
    }

    /// Clamp requested timeouts to `max_secs`, as drivers with a hardware
    /// limit do. Set-timeout still succeeds and reports the clamped value.
    #[must_use]
    pub fn with_max_timeout(self, max_secs: u32) -> Self {
        self.inner.lock().max_timeout_secs = Some(max_secs);
        self
    }

    /// Fail the next `times` calls at `point`.
    pub fn fail_next(&self, point: FaultPoint, times: u32) {
        if times > 0 {
            self.inner.lock().faults.insert(point, Fault::Times(times));
        }
    }

    /// Fail every call at `point`.
    pub fn fail_always(&self, point: FaultPoint) {
        self.inner.lock().faults.insert(point, Fault::Always);
    }

    /// Stop injecting failures at `point`.
    pub fn clear_fault(&self, point: FaultPoint) {
        self.inner.lock().faults.remove(&point);
    }

    /// Operations received so far.
    #[must_use]
    pub fn operations(&self) -> Vec<DeviceOp> {
        self.inner.lock().ops.clone()
    }

    /// Number of recorded operations equal to `op`.
    #[must_use]
    pub fn count(&self, op: &DeviceOp) -> usize {
        self.inner.lock().ops.iter().filter(|o| *o == op).count()
    }

    /// Keep-alives attempted, failed ones included.
    #[must_use]
    pub fn keep_alive_attempts(&self) -> usize {
        self.count(&DeviceOp::KeepAlive)
    }

    /// Whether the simulated timer is running.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.lock().armed
    }

    /// Whether a descriptor is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.lock().open
    }

    /// Timeout the simulated timer runs with.
    #[must_use]
    pub fn timeout_secs(&self) -> u32 {
        self.inner.lock().timeout_secs
    }
}

impl Default for SimulatedWatchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverOpener for SimulatedWatchdog {
    type Driver = SimulatedDriver;

    fn open(&self, path: &Path) -> io::Result<Self::Driver> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::Open(path.to_path_buf()));
        inner.take_fault(FaultPoint::Open)?;
        if inner.open {
            return Err(io::Error::from(io::ErrorKind::ResourceBusy));
        }
        inner.open = true;
        inner.armed = true;
        Ok(SimulatedDriver {
            inner: Arc::clone(&self.inner),
            sentinel_written: false,
        })
    }
}

/// Open descriptor on a [`SimulatedWatchdog`].
#[derive(Debug)]
pub struct SimulatedDriver {
    inner: Arc<Mutex<Inner>>,
    sentinel_written: bool,
}

impl WatchdogDriver for SimulatedDriver {
    fn query_support(&mut self) -> io::Result<DeviceIdentity> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::QuerySupport);
        inner.take_fault(FaultPoint::QuerySupport)?;
        Ok(inner.identity.clone())
    }

    fn set_timeout(&mut self, timeout_secs: u32) -> io::Result<u32> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::SetTimeout(timeout_secs));
        inner.take_fault(FaultPoint::SetTimeout)?;
        let applied = inner
            .max_timeout_secs
            .map_or(timeout_secs, |max| timeout_secs.min(max));
        inner.timeout_secs = applied;
        Ok(applied)
    }

    fn get_timeout(&mut self) -> io::Result<u32> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::GetTimeout);
        inner.take_fault(FaultPoint::GetTimeout)?;
        Ok(inner.timeout_secs)
    }

    fn keep_alive(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::KeepAlive);
        inner.take_fault(FaultPoint::KeepAlive)
    }

    fn disable_card(&mut self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::DisableCard);
        inner.take_fault(FaultPoint::DisableCard)?;
        inner.armed = false;
        Ok(())
    }

    fn write_sentinel(&mut self, byte: u8) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::Write(byte));
        inner.take_fault(FaultPoint::Write)?;
        self.sentinel_written = byte == SENTINEL_BYTE;
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(DeviceOp::Close);
        inner.open = false;
        if self.sentinel_written {
            inner.armed = false;
        }
        inner.take_fault(FaultPoint::Close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_arms_device() -> io::Result<()> {
        let device = SimulatedWatchdog::new();
        assert!(!device.is_armed());

        let driver = device.open(Path::new("/dev/watchdog"))?;
        assert!(device.is_armed());
        assert!(device.is_open());

        driver.close()?;
        assert!(device.is_armed());
        assert!(!device.is_open());
        Ok(())
    }

    #[test]
    fn test_second_open_is_busy() -> io::Result<()> {
        let device = SimulatedWatchdog::new();
        let _driver = device.open(Path::new("/dev/watchdog"))?;
        let second = device.open(Path::new("/dev/watchdog"));
        assert!(matches!(second, Err(e) if e.kind() == io::ErrorKind::ResourceBusy));
        Ok(())
    }

    #[test]
    fn test_magic_close_disarms() -> io::Result<()> {
        let device = SimulatedWatchdog::new();
        let mut driver = device.open(Path::new("/dev/watchdog"))?;
        driver.write_sentinel(SENTINEL_BYTE)?;
        assert!(device.is_armed());
        driver.close()?;
        assert!(!device.is_armed());
        Ok(())
    }

    #[test]
    fn test_fault_injection_counts_down() -> io::Result<()> {
        let device = SimulatedWatchdog::new();
        device.fail_next(FaultPoint::KeepAlive, 2);
        let mut driver = device.open(Path::new("/dev/watchdog"))?;

        assert!(driver.keep_alive().is_err());
        assert!(driver.keep_alive().is_err());
        assert!(driver.keep_alive().is_ok());
        assert_eq!(device.keep_alive_attempts(), 3);
        Ok(())
    }

    #[test]
    fn test_fail_always_until_cleared() -> io::Result<()> {
        let device = SimulatedWatchdog::new();
        device.fail_always(FaultPoint::SetTimeout);
        let mut driver = device.open(Path::new("/dev/watchdog"))?;

        assert!(driver.set_timeout(10).is_err());
        assert!(driver.set_timeout(10).is_err());
        assert_eq!(device.timeout_secs(), SIMULATED_DEFAULT_TIMEOUT_SECS);

        device.clear_fault(FaultPoint::SetTimeout);
        assert_eq!(driver.set_timeout(10)?, 10);
        assert_eq!(device.timeout_secs(), 10);
        Ok(())
    }

    #[test]
    fn test_max_timeout_clamps_request() -> io::Result<()> {
        let device = SimulatedWatchdog::new().with_max_timeout(4);
        let mut driver = device.open(Path::new("/dev/watchdog"))?;
        assert_eq!(driver.set_timeout(10)?, 4);
        assert_eq!(driver.set_timeout(3)?, 3);
        assert_eq!(driver.get_timeout()?, 3);
        assert_eq!(device.operations().get(1), Some(&DeviceOp::SetTimeout(10)));
        driver.close()
    }
}
