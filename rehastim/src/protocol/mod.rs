//! ScienceMode 2 protocol implementation.

pub mod codec;
pub mod command;
pub mod crc;
pub mod status;

// Re-export common types
pub use codec::{CommandFrame, Packet, PacketFramer, PayloadCursor, encode};
pub use command::Command;
pub use status::{Classification, Severity, StimulationMode};
