//! Configuration types for the watchdog daemon.

use crate::error::{WatchdogError, WatchdogResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device node opened when no path is given.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/watchdog";

/// Requested hardware timeout when none is given.
pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

/// Keep-alive interval when none is given.
pub const DEFAULT_PING_INTERVAL_SECS: u32 = 5;

/// Consecutive ping failures before the operator is alerted.
pub const DEFAULT_PING_FAILURE_ALERT_THRESHOLD: u32 = 3;

/// Watchdog daemon configuration.
///
/// An immutable snapshot consumed once by
/// [`WatchdogController::start`](crate::WatchdogController::start).
/// Fields missing from a deserialized document take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Watchdog device node.
    ///
    /// Default: `/dev/watchdog`.
    pub device_path: PathBuf,

    /// Hardware timeout requested from the driver, in seconds.
    ///
    /// Default: 10s.
    pub timeout_secs: u32,

    /// Delay between keep-alives, in seconds.
    ///
    /// Should stay strictly below `timeout_secs`; see [`ConfigWarning`].
    pub ping_interval_secs: u32,

    /// Disarm the device when the daemon stops.
    ///
    /// When false the device is closed armed, so the machine resets if
    /// nothing else takes over the keep-alive.
    pub disarm_on_close: bool,

    /// Consecutive ping failures that raise an operator alert.
    pub ping_failure_alert_threshold: u32,
}

impl WatchdogConfig {
    /// Create a configuration for `device_path` with default timings.
    #[must_use]
    pub fn new(device_path: impl Into<PathBuf>) -> Self {
        Self {
            device_path: device_path.into(),
            ..Self::default()
        }
    }

    /// Create a configuration builder.
    #[must_use]
    pub fn builder() -> WatchdogConfigBuilder {
        WatchdogConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a value makes the daemon unusable: an empty
    /// device path, a zero timeout, a zero ping interval or a zero alert
    /// threshold.
    pub fn validate(&self) -> WatchdogResult<()> {
        if self.device_path.as_os_str().is_empty() {
            return Err(WatchdogError::invalid_configuration(
                "device_path must not be empty",
            ));
        }
        if self.timeout_secs == 0 {
            return Err(WatchdogError::invalid_configuration(
                "timeout_secs must be at least 1",
            ));
        }
        if self.ping_interval_secs == 0 {
            return Err(WatchdogError::invalid_configuration(
                "ping_interval_secs must be at least 1",
            ));
        }
        if self.ping_failure_alert_threshold == 0 {
            return Err(WatchdogError::invalid_configuration(
                "ping_failure_alert_threshold must be at least 1",
            ));
        }
        Ok(())
    }

    /// Non-fatal problems with this configuration.
    ///
    /// The daemon still runs with these settings, but cannot guarantee that
    /// the hardware stays quiet while it does.
    #[must_use]
    pub fn warnings(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if self.ping_interval_secs >= self.timeout_secs {
            warnings.push(ConfigWarning::PingIntervalNotBelowTimeout {
                ping_interval_secs: self.ping_interval_secs,
                timeout_secs: self.timeout_secs,
            });
        }
        warnings
    }

    /// Get the device path.
    #[must_use]
    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    /// Get the ping interval as a `Duration`.
    #[must_use]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.ping_interval_secs))
    }

    /// Get the requested timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs))
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            device_path: PathBuf::from(DEFAULT_DEVICE_PATH),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            disarm_on_close: false,
            ping_failure_alert_threshold: DEFAULT_PING_FAILURE_ALERT_THRESHOLD,
        }
    }
}

/// A setting that is accepted but weakens the reset protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The configured ping interval is not shorter than the requested timeout.
    PingIntervalNotBelowTimeout {
        /// Configured ping interval.
        ping_interval_secs: u32,
        /// Requested timeout.
        timeout_secs: u32,
    },
    /// The device runs with a timeout (clamped, rounded or its own) that the
    /// ping interval does not beat.
    DeviceTimeoutNotAboveInterval {
        /// Configured ping interval.
        ping_interval_secs: u32,
        /// Timeout reported by the device.
        device_timeout_secs: u32,
    },
    /// The timeout could not be set nor read back.
    DeviceTimeoutUnknown {
        /// Configured ping interval.
        ping_interval_secs: u32,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PingIntervalNotBelowTimeout {
                ping_interval_secs,
                timeout_secs,
            } => write!(
                f,
                "ping interval {ping_interval_secs}s is not below the {timeout_secs}s timeout; \
                 the watchdog may reset the system while the daemon is running"
            ),
            Self::DeviceTimeoutNotAboveInterval {
                ping_interval_secs,
                device_timeout_secs,
            } => write!(
                f,
                "device timeout {device_timeout_secs}s is not above the \
                 {ping_interval_secs}s ping interval"
            ),
            Self::DeviceTimeoutUnknown { ping_interval_secs } => write!(
                f,
                "device timeout unknown; {ping_interval_secs}s ping interval may be too slow"
            ),
        }
    }
}

/// Builder for `WatchdogConfig`.
#[derive(Debug, Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// Start from an existing configuration.
    #[must_use]
    pub fn from_config(config: WatchdogConfig) -> Self {
        Self { config }
    }

    /// Set the device path.
    #[must_use]
    pub fn device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.device_path = path.into();
        self
    }

    /// Set the requested timeout in seconds.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u32) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Set the ping interval in seconds.
    #[must_use]
    pub fn ping_interval_secs(mut self, secs: u32) -> Self {
        self.config.ping_interval_secs = secs;
        self
    }

    /// Disarm the device on close.
    #[must_use]
    pub fn disarm_on_close(mut self, disarm: bool) -> Self {
        self.config.disarm_on_close = disarm;
        self
    }

    /// Set the consecutive-failure alert threshold.
    #[must_use]
    pub fn ping_failure_alert_threshold(mut self, count: u32) -> Self {
        self.config.ping_failure_alert_threshold = count;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> WatchdogResult<WatchdogConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatchdogConfig::default();
        assert_eq!(config.device_path, PathBuf::from("/dev/watchdog"));
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.ping_interval_secs, 5);
        assert!(!config.disarm_on_close);
        assert!(config.warnings().is_empty());
    }

    #[test]
    fn test_config_validation() {
        let result = WatchdogConfig::builder().timeout_secs(0).build();
        assert!(matches!(result, Err(WatchdogError::InvalidConfiguration(_))));

        let result = WatchdogConfig::builder().ping_interval_secs(0).build();
        assert!(matches!(result, Err(WatchdogError::InvalidConfiguration(_))));

        let result = WatchdogConfig::builder().device_path("").build();
        assert!(matches!(result, Err(WatchdogError::InvalidConfiguration(_))));

        let result = WatchdogConfig::builder().ping_failure_alert_threshold(0).build();
        assert!(result.is_err());

        let result = WatchdogConfig::builder().timeout_secs(1).ping_interval_secs(1).build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_slow_ping_is_a_warning_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let config = WatchdogConfig::builder()
            .timeout_secs(5)
            .ping_interval_secs(5)
            .build()?;
        assert_eq!(
            config.warnings(),
            vec![ConfigWarning::PingIntervalNotBelowTimeout {
                ping_interval_secs: 5,
                timeout_secs: 5,
            }]
        );
        Ok(())
    }

    #[test]
    fn test_config_builder() -> Result<(), Box<dyn std::error::Error>> {
        let config = WatchdogConfig::builder()
            .device_path("/dev/watchdog1")
            .timeout_secs(30)
            .ping_interval_secs(10)
            .disarm_on_close(true)
            .ping_failure_alert_threshold(5)
            .build()?;
        assert_eq!(config.device_path(), Path::new("/dev/watchdog1"));
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.ping_interval(), Duration::from_secs(10));
        assert!(config.disarm_on_close);
        assert_eq!(config.ping_failure_alert_threshold, 5);
        Ok(())
    }

    #[test]
    fn test_partial_document_uses_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let config: WatchdogConfig =
            serde_json::from_str(r#"{ "timeout_secs": 60, "disarm_on_close": true }"#)?;
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.ping_interval_secs, DEFAULT_PING_INTERVAL_SECS);
        assert_eq!(config.device_path, PathBuf::from(DEFAULT_DEVICE_PATH));
        assert!(config.disarm_on_close);

        let unknown = serde_json::from_str::<WatchdogConfig>(r#"{ "pingrate": 1 }"#);
        assert!(unknown.is_err());
        Ok(())
    }
}
