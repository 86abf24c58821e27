//! The keep-alive loop.
//!
//! [`WatchdogController::start`] opens and arms the device;
//! [`WatchdogController::run`] pings it every `ping_interval_secs` until the
//! shutdown flag is raised, then closes it (disarming when configured).

use crate::config::{ConfigWarning, WatchdogConfig};
use crate::device::{CloseReport, DeviceHandle, DeviceIdentity, DriverOpener, WatchdogDriver};
use crate::error::WatchdogResult;
use crate::shutdown::ShutdownListener;
use crate::state::{ControllerState, PingMetrics, StateCell};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Summary of a finished run.
#[derive(Debug)]
pub struct RunReport {
    /// State the controller ended in.
    pub final_state: ControllerState,
    /// Keep-alive counters.
    pub metrics: PingMetrics,
    /// Outcome of the close, `None` if the device was already closed.
    pub close: Option<CloseReport>,
    /// Configuration warnings raised at start.
    pub warnings: Vec<ConfigWarning>,
    /// Identity reported by the device, if any.
    pub identity: Option<DeviceIdentity>,
}

/// Owns the device for the lifetime of the daemon and drives the ping loop.
#[derive(Debug)]
pub struct WatchdogController<D: WatchdogDriver> {
    config: WatchdogConfig,
    handle: DeviceHandle<D>,
    state: Arc<StateCell>,
    metrics: PingMetrics,
    warnings: Vec<ConfigWarning>,
}

impl<D: WatchdogDriver> WatchdogController<D> {
    /// Validate `config`, then open and arm the device through `opener`.
    ///
    /// Configuration warnings are logged and kept for the [`RunReport`];
    /// they never prevent the start.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::InvalidConfiguration`](crate::WatchdogError::InvalidConfiguration)
    /// or [`WatchdogError::OpenFailed`](crate::WatchdogError::OpenFailed).
    /// No device operation besides the open attempt has happened in either
    /// case.
    pub fn start<O>(config: WatchdogConfig, opener: &O) -> WatchdogResult<Self>
    where
        O: DriverOpener<Driver = D>,
    {
        Self::start_with_state(config, opener, Arc::new(StateCell::new()))
    }

    /// Like [`WatchdogController::start`], publishing state into `state`.
    ///
    /// # Errors
    ///
    /// Same as [`WatchdogController::start`]. On failure `state` is left in
    /// [`ControllerState::Terminated`].
    pub fn start_with_state<O>(
        config: WatchdogConfig,
        opener: &O,
        state: Arc<StateCell>,
    ) -> WatchdogResult<Self>
    where
        O: DriverOpener<Driver = D>,
    {
        if let Err(e) = config.validate() {
            error!(error = %e, "refusing to start with invalid configuration");
            state.transition(ControllerState::Terminated)?;
            return Err(e);
        }

        let mut warnings = config.warnings();

        let handle = match DeviceHandle::open(opener, &config.device_path, config.timeout_secs) {
            Ok(handle) => handle,
            Err(e) => {
                state.transition(ControllerState::Terminated)?;
                return Err(e);
            }
        };

        // The driver may clamp or round the request, or keep its own value.
        match handle.open_report().effective_timeout_secs() {
            Some(device_timeout_secs)
                if device_timeout_secs != config.timeout_secs
                    && config.ping_interval_secs >= device_timeout_secs =>
            {
                warnings.push(ConfigWarning::DeviceTimeoutNotAboveInterval {
                    ping_interval_secs: config.ping_interval_secs,
                    device_timeout_secs,
                });
            }
            Some(_) => {}
            None => warnings.push(ConfigWarning::DeviceTimeoutUnknown {
                ping_interval_secs: config.ping_interval_secs,
            }),
        }

        for warning in &warnings {
            warn!(%warning, "watchdog configuration warning");
        }

        Ok(Self {
            config,
            handle,
            state,
            metrics: PingMetrics::new(),
            warnings,
        })
    }

    /// Shared view of the controller state.
    #[must_use]
    pub fn state(&self) -> Arc<StateCell> {
        Arc::clone(&self.state)
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    /// Warnings raised at start.
    #[must_use]
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Ping until `shutdown` is raised, then close the device.
    ///
    /// The flag is checked before every ping, and the interval sleep is cut
    /// short when it is raised, so no ping follows a shutdown request.
    ///
    /// # Errors
    ///
    /// Only returns an error if the state machine was driven out of order,
    /// which indicates a bug. Device failures are reported in the
    /// [`RunReport`].
    pub async fn run(mut self, mut shutdown: ShutdownListener) -> WatchdogResult<RunReport> {
        self.state.transition(ControllerState::Running)?;
        let interval = self.config.ping_interval();
        info!(
            path = %self.handle.path().display(),
            timeout_secs = self.config.timeout_secs,
            ping_interval_secs = self.config.ping_interval_secs,
            disarm_on_close = self.config.disarm_on_close,
            "watchdog keep-alive loop started"
        );

        while !shutdown.is_requested() {
            self.ping();
            tokio::select! {
                biased;
                () = shutdown.requested() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        self.state.transition(ControllerState::Stopping)?;
        info!(
            pings = self.metrics.attempts,
            failed = self.metrics.failures,
            "stopping watchdog keep-alive loop"
        );

        let close = self.handle.close(self.config.disarm_on_close);
        self.state.transition(ControllerState::Terminated)?;

        Ok(RunReport {
            final_state: self.state.get(),
            metrics: self.metrics,
            close,
            warnings: self.warnings,
            identity: self.handle.open_report().identity.clone(),
        })
    }

    fn ping(&mut self) {
        match self.handle.ping() {
            Ok(()) => {
                let ended_streak = self.metrics.record_success();
                if ended_streak > 0 {
                    info!(failed_pings = ended_streak, "watchdog keep-alive recovered");
                } else {
                    debug!("watchdog pinged");
                }
            }
            Err(e) => {
                let streak = self.metrics.record_failure();
                warn!(error = %e, consecutive_failures = streak, "error while pinging watchdog");
                if streak == self.config.ping_failure_alert_threshold {
                    error!(
                        consecutive_failures = streak,
                        timeout_secs = self.config.timeout_secs,
                        "watchdog keep-alive keeps failing, the system may be reset"
                    );
                }
            }
        }
    }
}
