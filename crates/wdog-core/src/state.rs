//! Controller state machine and ping metrics.
//!
//! The controller publishes its state through an atomic [`StateCell`] so the
//! binary and tests can observe it while the loop is running.

use crate::error::{WatchdogError, WatchdogResult};
use portable_atomic::{AtomicU32, Ordering};

/// Lifecycle state of the [`WatchdogController`](crate::WatchdogController).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum ControllerState {
    /// Device not yet opened.
    #[default]
    Initializing = 0,
    /// Device open and being pinged.
    Running = 1,
    /// Shutdown observed, device being closed.
    Stopping = 2,
    /// Terminal; the device is no longer touched.
    Terminated = 3,
}

impl ControllerState {
    /// Convert from raw u32 value.
    #[must_use]
    pub fn from_raw(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Initializing),
            1 => Some(Self::Running),
            2 => Some(Self::Stopping),
            3 => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Convert to raw u32 value.
    #[must_use]
    pub fn to_raw(self) -> u32 {
        self as u32
    }

    /// Check if this is the terminal state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Whether the state machine may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Initializing, Self::Running | Self::Terminated)
                | (Self::Running, Self::Stopping)
                | (Self::Stopping, Self::Terminated)
        )
    }

    /// Get the state as a string slice.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Terminated => "Terminated",
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for a [`ControllerState`].
///
/// Transitions use compare-and-swap, so a state is only left once.
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU32,
}

impl StateCell {
    /// Create a cell in the `Initializing` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: AtomicU32::new(ControllerState::Initializing.to_raw()),
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn get(&self) -> ControllerState {
        let raw = self.state.load(Ordering::Acquire);
        ControllerState::from_raw(raw).unwrap_or(ControllerState::Terminated)
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`WatchdogError::InvalidTransition`] if `next` is not
    /// reachable from the current state.
    pub fn transition(&self, next: ControllerState) -> WatchdogResult<ControllerState> {
        let current = self.get();
        if !current.can_transition_to(next) {
            return Err(WatchdogError::invalid_transition(
                current.as_str(),
                next.as_str(),
            ));
        }

        self.state
            .compare_exchange(
                current.to_raw(),
                next.to_raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| current)
            .map_err(|raw| {
                let actual = ControllerState::from_raw(raw).unwrap_or(ControllerState::Terminated);
                WatchdogError::invalid_transition(actual.as_str(), next.as_str())
            })
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Keep-alive counters kept by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingMetrics {
    /// Keep-alives attempted.
    pub attempts: u64,
    /// Keep-alives that failed.
    pub failures: u64,
    /// Current run of failed keep-alives.
    pub consecutive_failures: u32,
    /// Longest run of failed keep-alives seen.
    pub longest_failure_streak: u32,
}

impl PingMetrics {
    /// Create zeroed metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful keep-alive.
    ///
    /// Returns the length of the failure streak that this success ended.
    pub fn record_success(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        std::mem::take(&mut self.consecutive_failures)
    }

    /// Record a failed keep-alive.
    ///
    /// Returns the length of the current failure streak.
    pub fn record_failure(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.failures = self.failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.longest_failure_streak = self.longest_failure_streak.max(self.consecutive_failures);
        self.consecutive_failures
    }

    /// Keep-alives that reached the device.
    #[must_use]
    pub fn successes(&self) -> u64 {
        self.attempts.saturating_sub(self.failures)
    }
}
