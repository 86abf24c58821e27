//! Linux `/dev/watchdog` driver.
//!
//! Talks to the kernel watchdog API from `linux/watchdog.h` through
//! `ioctl(2)`. Request codes are computed with the generic `_IOC` layout
//! used by x86, arm and riscv.

#![expect(unsafe_code, reason = "watchdog ioctls and close(2) go through libc")]

use crate::device::{DeviceIdentity, DriverOpener, WatchdogDriver};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, IntoRawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = 8;
const IOC_SIZESHIFT: u32 = 16;
const IOC_DIRSHIFT: u32 = 30;
const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const WATCHDOG_IOCTL_BASE: u8 = b'W';

const fn ioctl_code(direction: u32, nr: u8, size: usize) -> libc::c_ulong {
    ((direction << IOC_DIRSHIFT)
        | ((WATCHDOG_IOCTL_BASE as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)) as libc::c_ulong
}

/// `struct watchdog_info`.
#[repr(C)]
#[derive(Debug, Default)]
struct WatchdogInfo {
    options: u32,
    firmware_version: u32,
    identity: [u8; 32],
}

const INT_SIZE: usize = std::mem::size_of::<libc::c_int>();

const WDIOC_GETSUPPORT: libc::c_ulong =
    ioctl_code(IOC_READ, 0, std::mem::size_of::<WatchdogInfo>());
const WDIOC_SETOPTIONS: libc::c_ulong = ioctl_code(IOC_READ, 4, INT_SIZE);
const WDIOC_KEEPALIVE: libc::c_ulong = ioctl_code(IOC_READ, 5, INT_SIZE);
const WDIOC_SETTIMEOUT: libc::c_ulong = ioctl_code(IOC_READ | IOC_WRITE, 6, INT_SIZE);
const WDIOC_GETTIMEOUT: libc::c_ulong = ioctl_code(IOC_READ, 7, INT_SIZE);

const WDIOS_DISABLECARD: libc::c_int = 0x0001;

fn check(rc: libc::c_int) -> io::Result<()> {
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn parse_identity(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(raw.get(..end).unwrap_or_default())
        .trim()
        .to_string()
}

/// Opens watchdog device nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxDriverOpener;

impl DriverOpener for LinuxDriverOpener {
    type Driver = LinuxWatchdogDriver;

    fn open(&self, path: &Path) -> io::Result<Self::Driver> {
        let file = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)?;
        Ok(LinuxWatchdogDriver { file })
    }
}

/// An open watchdog character device.
#[derive(Debug)]
pub struct LinuxWatchdogDriver {
    file: File,
}

impl LinuxWatchdogDriver {
    fn ioctl_int(&self, request: libc::c_ulong, value: &mut libc::c_int) -> io::Result<()> {
        let fd = self.file.as_raw_fd();
        // SAFETY: `fd` is owned by `self.file` and open; `value` is a valid,
        // exclusively borrowed `c_int` as every integer watchdog ioctl expects.
        let rc = unsafe { libc::ioctl(fd, request, std::ptr::from_mut(value)) };
        check(rc)
    }
}

impl WatchdogDriver for LinuxWatchdogDriver {
    fn query_support(&mut self) -> io::Result<DeviceIdentity> {
        let mut info = WatchdogInfo::default();
        let fd = self.file.as_raw_fd();
        // SAFETY: `info` matches `struct watchdog_info` (repr(C)) and the
        // kernel writes at most `size_of::<WatchdogInfo>()` bytes into it.
        let rc = unsafe { libc::ioctl(fd, WDIOC_GETSUPPORT, std::ptr::from_mut(&mut info)) };
        check(rc)?;
        Ok(DeviceIdentity {
            identity: parse_identity(&info.identity),
            firmware_version: info.firmware_version,
            options: info.options,
        })
    }

    fn set_timeout(&mut self, timeout_secs: u32) -> io::Result<u32> {
        let mut value = libc::c_int::try_from(timeout_secs)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.ioctl_int(WDIOC_SETTIMEOUT, &mut value)?;
        u32::try_from(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn get_timeout(&mut self) -> io::Result<u32> {
        let mut value: libc::c_int = 0;
        self.ioctl_int(WDIOC_GETTIMEOUT, &mut value)?;
        u32::try_from(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn keep_alive(&mut self) -> io::Result<()> {
        let mut unused: libc::c_int = 0;
        self.ioctl_int(WDIOC_KEEPALIVE, &mut unused)
    }

    fn disable_card(&mut self) -> io::Result<()> {
        let mut flags = WDIOS_DISABLECARD;
        self.ioctl_int(WDIOC_SETOPTIONS, &mut flags)
    }

    fn write_sentinel(&mut self, byte: u8) -> io::Result<()> {
        self.file.write_all(&[byte])
    }

    fn close(self) -> io::Result<()> {
        let fd = self.file.into_raw_fd();
        // SAFETY: `into_raw_fd` transferred ownership of `fd` to us and
        // nothing else refers to it; it is closed exactly once here.
        let rc = unsafe { libc::close(fd) };
        check(rc)
    }
}
