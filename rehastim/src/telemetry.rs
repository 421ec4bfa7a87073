//! MOTOmed telemetry decoding.
//!
//! The trainer streams two periodic reports over the stimulator link:
//!
//! - `ActualValues`: current crank angle, speed and torque.
//! - `PhaseResult`: summary of a finished training phase.
//!
//! Both are decoded field by field through a [`PayloadCursor`], so a stuffed
//! byte in one field shifts every later field correctly.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::protocol::{Command, Packet, PayloadCursor};

/// Default number of retained actual-value samples.
pub const DEFAULT_MAX_SAMPLES: usize = 100;

/// Default number of retained phase results.
pub const DEFAULT_MAX_PHASE_RESULTS: usize = 1;

/// One `ActualValues` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActualValuesSample {
    /// Crank angle.
    pub angle: i16,
    /// Speed in rpm (negative when turning backwards).
    pub speed: i16,
    /// Torque in Nm.
    pub torque: i16,
}

impl ActualValuesSample {
    /// Decode an `ActualValues` packet.
    pub fn decode(packet: &Packet) -> Result<Self> {
        expect_command(packet, Command::ActualValues)?;
        let mut cursor = packet.cursor();
        Self::read(&mut cursor)
    }

    fn read(cursor: &mut PayloadCursor<'_>) -> Result<Self> {
        Ok(Self {
            angle: cursor.read_i16_be()?,
            speed: cursor.read_i16_be()?,
            torque: cursor.read_i16_be()?,
        })
    }
}

/// One `PhaseResult` report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhaseResult {
    /// Index of the finished phase.
    pub phase_number: u8,
    /// Distance covered passively.
    pub passive_distance: u16,
    /// Distance covered actively.
    pub active_distance: u16,
    /// Average power in W.
    pub average_power: u8,
    /// Peak power in W.
    pub maximum_power: u8,
    /// Phase duration in s.
    pub phase_duration: u16,
    /// Active part of the phase in s.
    pub active_phase_duration: u16,
    /// Work in J.
    pub phase_work: u16,
    /// Success value in percent.
    pub success_value: u8,
    /// Left/right symmetry, negative when the left side dominates.
    pub symmetry: i8,
    /// Average muscle tone.
    pub average_muscle_tone: u8,
}

impl PhaseResult {
    /// Decode a `PhaseResult` packet.
    pub fn decode(packet: &Packet) -> Result<Self> {
        expect_command(packet, Command::PhaseResult)?;
        let mut c = packet.cursor();
        Ok(Self {
            phase_number: c.read_u8()?,
            passive_distance: c.read_u16_be()?,
            active_distance: c.read_u16_be()?,
            average_power: c.read_u8()?,
            maximum_power: c.read_u8()?,
            phase_duration: c.read_u16_be()?,
            active_phase_duration: c.read_u16_be()?,
            phase_work: c.read_u16_be()?,
            success_value: c.read_u8()?,
            symmetry: c.read_i8()?,
            average_muscle_tone: c.read_u8()?,
        })
    }
}

fn expect_command(packet: &Packet, command: Command) -> Result<()> {
    if packet.code() == command.code() {
        Ok(())
    } else {
        Err(Error::Protocol(format!(
            "expected {command} packet, got code {:#04x}",
            packet.code()
        )))
    }
}

/// Fixed-capacity FIFO keeping the most recent records.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer holding at most `capacity` items (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, evicting the oldest entry when full.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Most recent item.
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Oldest retained item.
    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Number of retained items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing has been retained yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Maximum number of retained items.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    /// Remove and return every item, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.items.drain(..)
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
