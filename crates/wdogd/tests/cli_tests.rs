//! Integration tests for the wdogd binary.
//!
//! A regular file stands in for the device node: every ioctl fails with
//! `ENOTTY`, which exercises the best-effort paths, while the sentinel write
//! lands in the file where it can be checked.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use std::process::Stdio;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const BIN: &str = env!("CARGO_BIN_EXE_wdogd");

fn wdogd() -> Command {
    Command::new(BIN)
}

/// Poll `condition` every 50ms until it holds or `limit` passes.
fn wait_until(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

/// Whether `path` holds a non-empty PID.
fn pid_written(path: &Path) -> bool {
    std::fs::read_to_string(path).is_ok_and(|pid| !pid.is_empty())
}

fn send_sigterm(pid: &str) -> TestResult {
    let status = std::process::Command::new("kill").args(["-TERM", pid]).status()?;
    assert!(status.success(), "kill -TERM {pid} failed");
    Ok(())
}

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Result<Self, std::io::Error> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("watchdog"), b"")?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn device(&self) -> std::path::PathBuf {
        self.path("watchdog")
    }

    fn pid_file(&self) -> std::path::PathBuf {
        self.path("wdogd.pid")
    }
}

#[test]
fn test_help_exits_zero() -> TestResult {
    wdogd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--pingrate"))
        .stdout(predicate::str::contains("--Devname"))
        .stdout(predicate::str::contains("--disable"));
    Ok(())
}

#[test]
fn test_version_exits_zero() -> TestResult {
    wdogd()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    Ok(())
}

#[test]
fn test_unknown_option_prints_usage_and_exits_zero() -> TestResult {
    wdogd()
        .arg("--frobnicate")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage"));
    Ok(())
}

#[test]
fn test_zero_pingrate_is_rejected_as_usage_error() -> TestResult {
    wdogd()
        .arg("-p=0")
        .assert()
        .success()
        .stderr(predicate::str::contains("Usage"));
    Ok(())
}

#[test]
fn test_missing_device_exits_one() -> TestResult {
    let sandbox = Sandbox::new()?;
    wdogd()
        .args(["-D", "/nonexistent/watchdog", "--pid-file"])
        .arg(sandbox.pid_file())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot start watchdog"))
        .stderr(predicate::str::contains("/nonexistent/watchdog"));

    assert!(!sandbox.pid_file().exists());
    Ok(())
}

#[test]
fn test_attached_short_values_reach_the_device() -> TestResult {
    let sandbox = Sandbox::new()?;
    wdogd()
        .args(["-t30", "-p2", "-D", "/nonexistent/watchdog", "--pid-file"])
        .arg(sandbox.pid_file())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot start watchdog"))
        .stderr(predicate::str::contains("Usage").not());
    Ok(())
}

#[test]
fn test_invalid_config_file_exits_one() -> TestResult {
    let sandbox = Sandbox::new()?;
    let config = sandbox.path("wdogd.json");
    std::fs::write(&config, r#"{ "timeout_secs": 0 }"#)?;

    wdogd()
        .arg("--config")
        .arg(&config)
        .arg("-D")
        .arg(sandbox.device())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid watchdog configuration"));
    Ok(())
}

#[test]
fn test_sigterm_disarms_and_exits_zero() -> TestResult {
    let sandbox = Sandbox::new()?;
    let log = sandbox.path("wdogd.log");

    let mut child = std::process::Command::new(BIN)
        .arg("-D")
        .arg(sandbox.device())
        .args(["-d", "-t=10", "-p=1", "--pid-file"])
        .arg(sandbox.pid_file())
        .arg("--log-file")
        .arg(&log)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    if !wait_until(Duration::from_secs(10), || pid_written(&sandbox.pid_file())) {
        child.kill()?;
        return Err("PID file never appeared".into());
    }
    let pid = std::fs::read_to_string(sandbox.pid_file())?;
    assert_eq!(pid, child.id().to_string());

    thread::sleep(Duration::from_millis(300));
    send_sigterm(&pid)?;

    let status = child.wait()?;
    assert_eq!(status.code(), Some(0));
    assert_eq!(std::fs::read(sandbox.device())?, b"V");
    assert!(!sandbox.pid_file().exists());

    let logs = std::fs::read_to_string(&log)?;
    assert!(logs.contains("watchdog keep-alive loop started"));
    assert!(logs.contains("SIGTERM"));
    assert!(logs.contains("error while pinging watchdog"));
    Ok(())
}

#[test]
fn test_background_daemon_detaches_and_stops_on_sigterm() -> TestResult {
    let sandbox = Sandbox::new()?;
    let log = sandbox.path("wdogd.log");

    wdogd()
        .arg("-b")
        .arg("-D")
        .arg(sandbox.device())
        .args(["-d", "-p=1", "--pid-file"])
        .arg(sandbox.pid_file())
        .arg("--log-file")
        .arg(&log)
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    let pid_file = sandbox.pid_file();
    assert!(wait_until(Duration::from_secs(10), || pid_written(&pid_file)));
    let pid = std::fs::read_to_string(&pid_file)?;
    send_sigterm(&pid)?;

    assert!(wait_until(Duration::from_secs(10), || !pid_file.exists()));
    assert!(wait_until(Duration::from_secs(5), || {
        std::fs::read(sandbox.device()).is_ok_and(|bytes| bytes == b"V")
    }));
    assert!(contains_line(&log, "wdogd stopped")?);
    Ok(())
}

fn contains_line(path: &Path, needle: &str) -> Result<bool, std::io::Error> {
    let limit = Instant::now() + Duration::from_secs(5);
    loop {
        let text = std::fs::read_to_string(path)?;
        if text.contains(needle) || Instant::now() >= limit {
            return Ok(text.contains(needle));
        }
        thread::sleep(Duration::from_millis(50));
    }
}
