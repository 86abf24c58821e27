//! # wdog-core
//!
//! Keep-alive engine for Linux watchdog devices.
//!
//! This crate holds everything `wdogd` does besides argument parsing:
//! - [`DeviceHandle`] over a [`WatchdogDriver`] (real `/dev/watchdog` ioctls or
//!   the recording [`SimulatedWatchdog`])
//! - [`WatchdogController`], the ping loop and its state machine
//! - [`SignalBridge`] and the [`ShutdownTrigger`]/[`ShutdownListener`] pair
//! - daemonization and PID-file bookkeeping in [`lifecycle`]
//!
//! ## Safety model
//!
//! - Only a failed `open` is fatal. Identity queries, timeout changes, pings
//!   and disarm steps are best-effort: failures are logged and returned in
//!   reports, and the daemon keeps going.
//! - The device is closed exactly once. Without `disarm_on_close` it is left
//!   armed, so a daemon that dies still gets the machine reset.
//! - Signal handlers only raise the shutdown flag; the close/disarm sequence
//!   always runs on the controller's own path.
//!
//! ## State Machine
//!
//! ```text
//! Initializing ──open ok──► Running ──shutdown──► Stopping ──close──► Terminated
//!       │                                                                 ▲
//!       └──────────────────────────open failed────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use wdog_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = SimulatedWatchdog::new();
//! let config = WatchdogConfig::builder()
//!     .device_path("/dev/watchdog")
//!     .timeout_secs(10)
//!     .ping_interval_secs(5)
//!     .disarm_on_close(true)
//!     .build()?;
//!
//! let (trigger, listener) = shutdown_channel();
//! let controller = WatchdogController::start(config, &device)?;
//! trigger.request();
//!
//! let report = controller.run(listener).await?;
//! assert_eq!(report.final_state, ControllerState::Terminated);
//! assert!(!device.is_armed());
//! # Ok(())
//! # }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs,
    missing_debug_implementations
)]
#![warn(clippy::pedantic)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod controller;
pub mod device;
pub mod error;
#[cfg(unix)]
pub mod lifecycle;
#[cfg(target_os = "linux")]
pub mod linux;
pub mod prelude;
pub mod shutdown;
#[cfg(unix)]
pub mod signal;
pub mod simulated;
pub mod state;

pub use config::{ConfigWarning, WatchdogConfig};
pub use controller::{RunReport, WatchdogController};
pub use device::{
    CloseReport, DeviceHandle, DeviceIdentity, DriverOpener, OpenReport, WatchdogDriver,
};
pub use error::{DisarmMethod, LifecycleError, WatchdogError, WatchdogResult};
#[cfg(target_os = "linux")]
pub use linux::{LinuxDriverOpener, LinuxWatchdogDriver};
pub use shutdown::{ShutdownListener, ShutdownTrigger, shutdown_channel};
#[cfg(unix)]
pub use signal::SignalBridge;
pub use simulated::{DeviceOp, FaultPoint, SimulatedWatchdog};
pub use state::{ControllerState, PingMetrics, StateCell};
