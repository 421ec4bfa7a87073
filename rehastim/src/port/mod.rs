//! Port abstraction for the stimulator link.
//!
//! The protocol engine talks to a [`Port`]: a byte stream that can report how
//! many bytes are waiting, so the reader never blocks on an empty line.
//!
//! - **Native platforms**: [`NativePort`] over the `serialport` crate
//! - **Tests and capture replay**: [`MemoryPort`], an in-process loopback
//!
//! ```text
//! +------------------+
//! |  Session         |  issue / telemetry getters
//! +--------+---------+
//!          |
//! +--------+---------+
//! |  Transport       |  write lock, non-blocking read
//! +--------+---------+
//!          |
//! +--------+---------+     +------------------+
//! | NativePort       |     | MemoryPort       |
//! |  (serialport)    |     |  (loopback)      |
//! +------------------+     +------------------+
//! ```

pub mod memory;
#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::codec::BAUD_RATE;

/// Serial port configuration.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read/write timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: BAUD_RATE,
            timeout: Duration::from_millis(100),
        }
    }
}

impl SerialConfig {
    /// Create a configuration for `port_name` at the Rehastim 2 baud rate.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Override the baud rate.
    #[must_use]
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Byte-stream port used by the protocol engine.
pub trait Port: Read + Write + Send {
    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Set the read/write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Number of received bytes waiting to be read.
    fn bytes_to_read(&mut self) -> Result<usize>;

    /// Clear input/output buffers.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Whether the port is still open.
    fn is_open(&self) -> bool;

    /// Close the port and release resources.
    ///
    /// Closing twice is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Write all bytes, blocking until complete.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }

    /// Read whatever is currently buffered, possibly nothing.
    fn read_available(&mut self) -> Result<Vec<u8>> {
        let waiting = self.bytes_to_read()?;
        if waiting == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; waiting];
        let n = std::io::Read::read(self, &mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }
}

pub use memory::{MemoryLink, MemoryPort};
#[cfg(feature = "native")]
pub use native::NativePort;
