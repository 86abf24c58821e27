//! Command line surface.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};
use wdog_core::WatchdogConfig;
use wdog_core::config::WatchdogConfigBuilder;
use wdog_core::lifecycle::DEFAULT_PID_FILE;

#[derive(Parser, Debug)]
#[command(name = "wdogd")]
#[command(about = "Keep a Linux watchdog device alive")]
#[command(version)]
#[command(long_about = "
wdogd opens a watchdog device, sets its timeout and pings it at a fixed rate
until it receives SIGTERM or SIGINT. Unless --disable is given the device is
left armed on exit, so the machine resets if nothing else takes over.
")]
pub struct Cli {
    /// Disarm the watchdog when the daemon stops
    #[arg(short = 'd', long = "disable")]
    pub disable: bool,

    /// Watchdog device node [default: /dev/watchdog]
    #[arg(short = 'D', long = "Devname", visible_alias = "devname", value_name = "PATH")]
    pub device: Option<PathBuf>,

    /// Hardware timeout in seconds [default: 10]
    #[arg(
        short = 't',
        long = "timeout",
        value_name = "SECS",
        num_args = 0..=1,
        default_missing_value = "10",
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub timeout: Option<u32>,

    /// Seconds between keep-alives [default: 5]
    #[arg(
        short = 'p',
        long = "pingrate",
        value_name = "SECS",
        num_args = 0..=1,
        default_missing_value = "5",
        value_parser = clap::value_parser!(u32).range(1..),
    )]
    pub pingrate: Option<u32>,

    /// Detach from the terminal and run in the background
    #[arg(short = 'b', long = "background")]
    pub background: bool,

    /// JSON configuration file; command line flags take precedence
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Where to record the daemon's process id
    #[arg(long, value_name = "FILE", default_value = DEFAULT_PID_FILE)]
    pub pid_file: PathBuf,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Merge the optional config file with the command line flags.
    pub fn resolve_config(&self) -> Result<WatchdogConfig> {
        let base = match &self.config {
            Some(path) => load_config_file(path)?,
            None => WatchdogConfig::default(),
        };

        let mut builder = WatchdogConfigBuilder::from_config(base);
        if let Some(device) = &self.device {
            builder = builder.device_path(device.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout_secs(timeout);
        }
        if let Some(pingrate) = self.pingrate {
            builder = builder.ping_interval_secs(pingrate);
        }
        if self.disable {
            builder = builder.disarm_on_close(true);
        }

        builder.build().context("invalid watchdog configuration")
    }
}

fn load_config_file(path: &Path) -> Result<WatchdogConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}

/// Resolve relative paths against the current directory.
///
/// Daemonizing changes to `/`, so anything relative must be pinned first.
pub fn absolutize(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("cannot resolve path {}", path.display()))
}
