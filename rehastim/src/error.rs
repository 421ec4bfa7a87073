//! Error types for rehastim.

use std::io;
use thiserror::Error;

/// Result type for rehastim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rehastim operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Malformed or incomplete packet.
    ///
    /// Never surfaced by a running session: the reader drops the span and
    /// keeps accumulating bytes.
    #[error("Framing error: {0}")]
    Framing(String),

    /// The stimulator reported a fatal stimulation error.
    #[error("Stimulation error {code}: {message}")]
    Stimulation {
        /// Signed status code from the device.
        code: i8,
        /// Human-readable description of the code.
        message: &'static str,
    },

    /// The device behaves differently from what the session was configured for.
    #[error("Configuration mismatch: {0}")]
    ConfigurationMismatch(String),

    /// Transport failed to open or write.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The session is not connected (never connected, or torn down while waiting).
    #[error("Session is disconnected")]
    Disconnected,

    /// A blocking wait was interrupted by the embedding application.
    #[error("Interrupted: {0}")]
    Interrupted(String),

    /// Communication timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unsupported device or operation.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A fatal condition latched by a session.
///
/// Once latched, every blocked and future caller receives the same fault
/// until [`Session::reset_fault`](crate::Session::reset_fault) is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Fatal stimulation status code.
    Stimulation {
        /// Signed status code.
        code: i8,
        /// Description of the code.
        message: &'static str,
    },
    /// Accessory data or handshake content the session did not expect.
    ConfigurationMismatch(String),
}

impl From<Fault> for Error {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::Stimulation { code, message } => Self::Stimulation { code, message },
            Fault::ConfigurationMismatch(msg) => Self::ConfigurationMismatch(msg),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stimulation { code, message } => write!(f, "stimulation error {code}: {message}"),
            Self::ConfigurationMismatch(msg) => write!(f, "configuration mismatch: {msg}"),
        }
    }
}
