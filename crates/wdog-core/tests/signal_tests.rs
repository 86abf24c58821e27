//! Delivers a real `SIGTERM` to the test process.
//!
//! Kept in its own test binary: once Tokio has registered the handler the
//! signal no longer terminates the process, and no other test may observe it.

#![cfg(unix)]

use std::process::Command;
use std::time::Duration;
use wdog_core::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn test_sigterm_stops_the_controller() -> TestResult {
    let device = SimulatedWatchdog::new();
    let config = WatchdogConfig::builder()
        .timeout_secs(10)
        .ping_interval_secs(1)
        .disarm_on_close(true)
        .build()?;

    let (trigger, listener) = shutdown_channel();
    let bridge = SignalBridge::install(trigger)?;
    let controller = WatchdogController::start(config, &device)?;
    let running = tokio::spawn(controller.run(listener));

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(!bridge.has_fired());
    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()?;
    assert!(status.success());

    let report = tokio::time::timeout(Duration::from_secs(5), running).await???;

    assert_eq!(report.final_state, ControllerState::Terminated);
    assert!(report.close.as_ref().is_some_and(CloseReport::disarmed));
    assert!(device.keep_alive_attempts() >= 1);
    assert_eq!(device.operations().last(), Some(&DeviceOp::Close));
    assert_eq!(device.count(&DeviceOp::Close), 1);
    assert!(!device.is_armed());
    Ok(())
}
