//! Session configuration.

use std::fmt;
use std::time::Duration;

use crate::telemetry::{DEFAULT_MAX_PHASE_RESULTS, DEFAULT_MAX_SAMPLES};

/// Default heartbeat tick.
pub const DEFAULT_WATCHDOG_TICK: Duration = Duration::from_millis(800);

/// Default silence after which the tick sends a heartbeat.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_millis(800);

/// Default silence after which a command is preceded by a heartbeat.
pub const DEFAULT_SEND_GAP_THRESHOLD: Duration = Duration::from_secs(1);

/// Default reader sleep when no bytes are waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default wait for a command acknowledgement.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(3);

/// Default wait for the device `Init` packet after opening the link.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Stimulator model behind the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DeviceType {
    /// Rehastim 2 speaking ScienceMode 2.
    #[default]
    Rehastim2,
    /// RehastimP24, driven through a vendor library.
    RehastimP24,
}

impl DeviceType {
    /// Get the device type from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name
            .to_lowercase()
            .as_str()
        {
            "rehastim2" | "rehastim" => Some(Self::Rehastim2),
            "rehastimp24" | "p24" => Some(Self::RehastimP24),
            _ => None,
        }
    }

    /// Get the device name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Rehastim2 => "Rehastim2",
            Self::RehastimP24 => "RehastimP24",
        }
    }

    /// Whether this crate can drive the device.
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Rehastim2)
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// How chatty the session is about traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Verbosity {
    /// Lifecycle and faults only.
    Quiet,
    /// Also every command sent and ack received.
    #[default]
    Status,
    /// Also raw packets.
    Full,
}

/// Heartbeat timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WatchdogConfig {
    /// Interval between idle checks.
    pub tick: Duration,
    /// Silence after which a tick sends a heartbeat.
    pub idle_threshold: Duration,
    /// Silence after which a command is preceded by a heartbeat.
    pub send_gap_threshold: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick: DEFAULT_WATCHDOG_TICK,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            send_gap_threshold: DEFAULT_SEND_GAP_THRESHOLD,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Device model.
    pub device: DeviceType,
    /// Whether a MOTOmed is attached and streams telemetry.
    pub with_motomed: bool,
    /// Heartbeat timing.
    pub watchdog: WatchdogConfig,
    /// Retained `ActualValues` samples.
    pub max_samples: usize,
    /// Retained phase results.
    pub max_phase_results: usize,
    /// Reader sleep when no bytes are waiting.
    pub poll_interval: Duration,
    /// Wait for a command acknowledgement.
    pub ack_timeout: Duration,
    /// Wait for the device `Init` packet.
    pub init_timeout: Duration,
    /// Traffic logging level.
    pub verbosity: Verbosity,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DeviceType::default(),
            with_motomed: false,
            watchdog: WatchdogConfig::default(),
            max_samples: DEFAULT_MAX_SAMPLES,
            max_phase_results: DEFAULT_MAX_PHASE_RESULTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            init_timeout: DEFAULT_INIT_TIMEOUT,
            verbosity: Verbosity::default(),
        }
    }
}

impl SessionConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Select the device model.
    #[must_use]
    pub fn with_device(mut self, device: DeviceType) -> Self {
        self.device = device;
        self
    }

    /// Declare an attached MOTOmed.
    #[must_use]
    pub fn with_motomed(mut self, with_motomed: bool) -> Self {
        self.with_motomed = with_motomed;
        self
    }

    /// Set heartbeat timing.
    #[must_use]
    pub fn with_watchdog(mut self, watchdog: WatchdogConfig) -> Self {
        self.watchdog = watchdog;
        self
    }

    /// Set the sample ring size.
    #[must_use]
    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = max_samples;
        self
    }

    /// Set the phase result ring size.
    #[must_use]
    pub fn with_max_phase_results(mut self, max_phase_results: usize) -> Self {
        self.max_phase_results = max_phase_results;
        self
    }

    /// Set the reader idle sleep.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the acknowledgement timeout.
    #[must_use]
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    /// Set the device `Init` timeout.
    #[must_use]
    pub fn with_init_timeout(mut self, init_timeout: Duration) -> Self {
        self.init_timeout = init_timeout;
        self
    }

    /// Set the traffic logging level.
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.device, DeviceType::Rehastim2);
        assert!(!config.with_motomed);
        assert_eq!(config.max_samples, 100);
        assert_eq!(config.max_phase_results, 1);
        assert_eq!(config.watchdog.tick, Duration::from_millis(800));
        assert_eq!(config.watchdog.idle_threshold, Duration::from_millis(800));
        assert_eq!(config.watchdog.send_gap_threshold, Duration::from_secs(1));
        assert_eq!(config.poll_interval, Duration::from_millis(5));
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_motomed(true)
            .with_max_samples(10)
            .with_verbosity(Verbosity::Full);
        assert!(config.with_motomed);
        assert_eq!(config.max_samples, 10);
        assert_eq!(config.verbosity, Verbosity::Full);
    }

    #[test]
    fn test_device_from_name() {
        assert_eq!(DeviceType::from_name("Rehastim2"), Some(DeviceType::Rehastim2));
        assert_eq!(DeviceType::from_name("p24"), Some(DeviceType::RehastimP24));
        assert_eq!(DeviceType::from_name("unknown"), None);
        assert!(!DeviceType::RehastimP24.is_supported());
        assert_eq!(DeviceType::Rehastim2.to_string(), "Rehastim2");
    }
}
