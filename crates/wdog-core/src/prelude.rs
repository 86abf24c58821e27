//! Prelude for wdog-core.
//!
//! This module re-exports the most commonly used types for convenient importing.
//!
//! # Example
//!
//! ```rust
//! use wdog_core::prelude::*;
//!
//! let config = WatchdogConfig::builder().timeout_secs(30).build()?;
//! assert!(config.warnings().is_empty());
//! # Ok::<(), WatchdogError>(())
//! ```

pub use crate::config::{ConfigWarning, WatchdogConfig, WatchdogConfigBuilder};
pub use crate::controller::{RunReport, WatchdogController};
pub use crate::device::{
    CloseReport, DeviceHandle, DeviceIdentity, DriverOpener, OpenReport, SENTINEL_BYTE,
    WatchdogDriver,
};
pub use crate::error::{DisarmMethod, LifecycleError, WatchdogError, WatchdogResult};
#[cfg(unix)]
pub use crate::lifecycle::{Daemonized, PidFile};
#[cfg(target_os = "linux")]
pub use crate::linux::LinuxDriverOpener;
pub use crate::shutdown::{ShutdownListener, ShutdownTrigger, shutdown_channel};
#[cfg(unix)]
pub use crate::signal::SignalBridge;
pub use crate::simulated::{DeviceOp, FaultPoint, SimulatedWatchdog};
pub use crate::state::{ControllerState, PingMetrics, StateCell};
