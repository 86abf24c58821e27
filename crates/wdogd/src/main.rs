//! wdogd - watchdog keep-alive daemon
//!
//! Opens a Linux watchdog device, pings it at a fixed rate and closes it on
//! `SIGTERM`/`SIGINT`, optionally disarming it first.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

#[cfg(not(target_os = "linux"))]
compile_error!("wdogd drives the Linux watchdog API and only builds on Linux");

mod cli;
mod logging;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};
use wdog_core::lifecycle::{self, Daemonized, PidFile};
use wdog_core::{
    LinuxDriverOpener, SignalBridge, WatchdogConfig, WatchdogController, shutdown_channel,
};

use crate::cli::Cli;
use crate::logging::LogSink;

/// Device could not be opened, or the configuration was unusable.
const EXIT_START_FAILED: u8 = 1;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // help, version and usage errors alike
            if let Err(io_error) = e.print() {
                eprintln!("wdogd: cannot print usage: {io_error}");
            }
            return ExitCode::SUCCESS;
        }
    };

    let sink = LogSink::select(cli.background, cli.log_file.as_deref());
    if let Err(e) = logging::init(cli.verbose, &sink) {
        eprintln!("wdogd: {e:#}");
        return ExitCode::from(EXIT_START_FAILED);
    }

    let (config, pid_path) = match prepare(&cli) {
        Ok(prepared) => prepared,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_START_FAILED);
        }
    };

    if cli.background {
        match lifecycle::daemonize() {
            Ok(Daemonized::Parent { child }) => {
                info!(child, "wdogd detached");
                return ExitCode::SUCCESS;
            }
            Ok(Daemonized::Child) => {}
            Err(e) => {
                error!(error = %e, "failed to daemonize");
                return ExitCode::from(e.exit_code().unwrap_or(EXIT_START_FAILED));
            }
        }
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build async runtime");
            return ExitCode::from(EXIT_START_FAILED);
        }
    };

    runtime.block_on(serve(config, pid_path))
}

/// Resolve the configuration and pin every path before a possible `chdir("/")`.
fn prepare(cli: &Cli) -> anyhow::Result<(WatchdogConfig, PathBuf)> {
    let mut config = cli.resolve_config()?;
    config.device_path = cli::absolutize(&config.device_path)?;
    let pid_path = cli::absolutize(&cli.pid_file)?;
    Ok((config, pid_path))
}

async fn serve(config: WatchdogConfig, pid_path: PathBuf) -> ExitCode {
    let (trigger, listener) = shutdown_channel();
    let _signals = match SignalBridge::install(trigger) {
        Ok(bridge) => bridge,
        Err(e) => {
            error!(error = %e, "failed to install signal handlers");
            return ExitCode::from(EXIT_START_FAILED);
        }
    };

    let controller = match WatchdogController::start(config, &LinuxDriverOpener) {
        Ok(controller) => controller,
        Err(e) => {
            error!(error = %e, "cannot start watchdog");
            return ExitCode::from(EXIT_START_FAILED);
        }
    };

    let pid_file = match PidFile::create(&pid_path) {
        Ok(pid_file) => Some(pid_file),
        Err(e) => {
            warn!(error = %e, "continuing without a PID file");
            None
        }
    };

    let result = controller.run(listener).await;

    if let Some(pid_file) = pid_file
        && let Err(e) = pid_file.remove()
    {
        warn!(error = %e, "failed to remove PID file");
    }

    match result {
        Ok(report) => {
            info!(
                pings = report.metrics.attempts,
                failed = report.metrics.failures,
                clean_close = report.close.as_ref().is_some_and(|close| close.is_clean()),
                "wdogd stopped"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "watchdog loop ended abnormally");
            ExitCode::FAILURE
        }
    }
}
