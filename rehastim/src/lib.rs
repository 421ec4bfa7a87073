//! # rehastim
//!
//! A driver for the Rehastim 2 electrical stimulator and the MOTOmed trainer
//! attached to it.
//!
//! This crate speaks the ScienceMode 2 serial protocol, including:
//!
//! - Byte-stuffed packet framing with CRC-8 checksums
//! - Command/acknowledgement correlation
//! - Heartbeat (watchdog) scheduling
//! - MOTOmed telemetry decoding
//! - Device error classification
//!
//! ## Supported Devices
//!
//! - Rehastim 2 (ScienceMode 2)
//! - RehastimP24 is recognised but rejected: it is driven through a vendor library
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use rehastim::{Motomed, PhaseSettings, Session, SessionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "native")]
//!     {
//!         let config = SessionConfig::default().with_motomed(true);
//!         let mut session = Session::open("/dev/ttyUSB0", config)?;
//!
//!         let motomed = Motomed::new(&session)?;
//!         motomed.init_phase_training(Default::default())?;
//!         motomed.start_phase(&PhaseSettings::default())?;
//!
//!         let sample = session.get_latest_sample()?;
//!         println!("speed {} rpm, torque {} Nm", sample.speed, sample.torque);
//!
//!         session.disconnect()?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod error;
pub mod motomed;
pub mod port;
pub mod protocol;
pub mod session;
pub mod telemetry;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker used by blocking session waits.
///
/// The checker should return `true` when the current wait should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupted_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    error::{Error, Fault, Result},
    motomed::{BodyPart, Motomed, PhaseSettings},
    port::{MemoryLink, MemoryPort, Port, SerialConfig},
    protocol::{
        Classification, Command, CommandFrame, Packet, PacketFramer, PayloadCursor, Severity,
        StimulationMode, encode,
    },
    session::{
        AckCorrelator, Acknowledgement, ConnectionState, DeviceType, Session, SessionConfig,
        Verbosity, WatchdogConfig,
    },
    telemetry::{ActualValuesSample, PhaseResult, RingBuffer},
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_checker_default_false() {
        assert!(!is_interrupted_requested());
    }
}
