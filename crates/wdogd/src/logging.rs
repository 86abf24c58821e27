//! Tracing subscriber setup.

use anyhow::{Context, Result};
use std::ffi::CStr;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use syslog_tracing::{Facility, Options, Syslog};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SYSLOG_IDENTITY: &CStr = c"wdogd";

/// Where log lines end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Standard error, the foreground default.
    Stderr,
    /// Appended to a file.
    File(PathBuf),
    /// The system log, `LOG_DAEMON` facility.
    Syslog,
}

impl LogSink {
    /// An explicit log file wins; a background daemon otherwise logs to the
    /// system log, since its stderr is pointed at `/dev/null`.
    pub fn select(background: bool, log_file: Option<&Path>) -> Self {
        match log_file {
            Some(path) => Self::File(path.to_path_buf()),
            None if background => Self::Syslog,
            None => Self::Stderr,
        }
    }
}

/// Filter used when `RUST_LOG` is unset.
fn default_directives(verbosity: u8) -> String {
    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    format!("wdogd={level},wdog_core={level}")
}

/// Install the global subscriber writing to `sink`.
///
/// `RUST_LOG` takes precedence over `verbosity`.
pub fn init(verbosity: u8, sink: &LogSink) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match sink {
        LogSink::Stderr => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogSink::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            registry
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        LogSink::Syslog => {
            let syslog = Syslog::new(SYSLOG_IDENTITY, Options::default(), Facility::Daemon)
                .context("system log is already claimed by this process")?;
            // syslogd stamps the time itself
            registry
                .with(fmt::layer().with_ansi(false).without_time().with_writer(syslog))
                .try_init()
        }
    };
    installed.context("failed to install log subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_raises_level() {
        assert_eq!(default_directives(0), "wdogd=info,wdog_core=info");
        assert_eq!(default_directives(1), "wdogd=debug,wdog_core=debug");
        assert_eq!(default_directives(4), "wdogd=trace,wdog_core=trace");
    }

    #[test]
    fn test_default_directives_parse() {
        for verbosity in 0..3 {
            assert!(EnvFilter::try_new(default_directives(verbosity)).is_ok());
        }
    }

    #[test]
    fn test_foreground_logs_to_stderr() {
        assert_eq!(LogSink::select(false, None), LogSink::Stderr);
    }

    #[test]
    fn test_background_logs_to_syslog() {
        assert_eq!(LogSink::select(true, None), LogSink::Syslog);
    }

    #[test]
    fn test_log_file_wins_in_both_modes() {
        let path = Path::new("/var/log/wdogd.log");
        assert_eq!(LogSink::select(false, Some(path)), LogSink::File(path.to_path_buf()));
        assert_eq!(LogSink::select(true, Some(path)), LogSink::File(path.to_path_buf()));
    }
}
