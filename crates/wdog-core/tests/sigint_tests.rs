//! Delivers a real `SIGINT` to the test process.
//!
//! Separate from the `SIGTERM` binary so each signal is the only one this
//! process ever receives.

#![cfg(unix)]

use std::process::Command;
use std::time::Duration;
use wdog_core::prelude::*;

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::test]
async fn test_sigint_requests_shutdown() -> TestResult {
    let device = SimulatedWatchdog::new();
    let config = WatchdogConfig::builder()
        .timeout_secs(10)
        .ping_interval_secs(1)
        .build()?;

    let (trigger, listener) = shutdown_channel();
    let mut observer = trigger.subscribe();
    let bridge = SignalBridge::install(trigger)?;
    let controller = WatchdogController::start(config, &device)?;
    let running = tokio::spawn(controller.run(listener));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!observer.is_requested());
    let status = Command::new("kill")
        .args(["-INT", &std::process::id().to_string()])
        .status()?;
    assert!(status.success());

    tokio::time::timeout(Duration::from_secs(5), observer.requested()).await?;
    let report = tokio::time::timeout(Duration::from_secs(5), running).await???;

    assert!(bridge.has_fired());
    assert_eq!(report.final_state, ControllerState::Terminated);
    assert_eq!(device.count(&DeviceOp::Close), 1);
    // disarm_on_close defaults to false
    assert!(device.is_armed());
    Ok(())
}
