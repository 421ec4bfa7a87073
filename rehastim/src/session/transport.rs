//! Serialized access to the port.
//!
//! Every write, heartbeats included, goes through one lock. The same lock
//! tracks the packet number and the time of the last send, so the heartbeat
//! injected after a long silence can never interleave with another writer.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::CommandFrame;

struct Link {
    port: Box<dyn Port>,
    sequence: u8,
    last_send: Option<Instant>,
}

impl Link {
    fn write_frame(&mut self, frame: &CommandFrame) -> Result<u8> {
        let sequence = self.sequence;
        let bytes = frame.build(sequence);
        trace!("TX {} #{sequence}: {bytes:02X?}", frame.command());
        self.port
            .write_all_bytes(&bytes)
            .map_err(|e| {
                Error::Connection(format!("write to {} failed: {e}", self.port.name()))
            })?;
        self.sequence = self
            .sequence
            .wrapping_add(1);
        self.last_send = Some(Instant::now());
        Ok(sequence)
    }

    fn idle_for(&self) -> Option<Duration> {
        self.last_send
            .map(|t| t.elapsed())
    }
}

/// Owner of the port shared by the session threads.
pub struct Transport {
    link: Mutex<Link>,
    name: String,
    send_gap: Duration,
}

impl Transport {
    /// Wrap an open port. Commands sent after `send_gap` of silence are
    /// preceded by a heartbeat.
    pub fn new(port: Box<dyn Port>, send_gap: Duration) -> Self {
        let name = port
            .name()
            .to_string();
        Self {
            link: Mutex::new(Link {
                port,
                sequence: 0,
                last_send: None,
            }),
            name,
            send_gap,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Port name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write a command frame and return the packet number it used.
    pub fn send(&self, frame: &CommandFrame) -> Result<u8> {
        let mut link = self.lock();
        if !link.port.is_open() {
            return Err(Error::Disconnected);
        }
        if link
            .idle_for()
            .is_some_and(|idle| idle > self.send_gap)
        {
            debug!("Link silent for more than {:?}, sending heartbeat first", self.send_gap);
            link.write_frame(&CommandFrame::watchdog())?;
        }
        link.write_frame(frame)
    }

    /// Send a heartbeat if nothing was written for longer than `idle`.
    ///
    /// Returns whether a heartbeat went out.
    pub fn heartbeat_if_idle(&self, idle: Duration) -> Result<bool> {
        let mut link = self.lock();
        if !link.port.is_open() {
            return Err(Error::Disconnected);
        }
        match link.idle_for() {
            Some(elapsed) if elapsed <= idle => Ok(false),
            _ => {
                link.write_frame(&CommandFrame::watchdog())?;
                Ok(true)
            },
        }
    }

    /// Read whatever the port has buffered.
    pub fn read_available(&self) -> Result<Vec<u8>> {
        let mut link = self.lock();
        if !link.port.is_open() {
            return Err(Error::Disconnected);
        }
        link.port
            .read_available()
    }

    /// Time since the last write, if any.
    pub fn idle_for(&self) -> Option<Duration> {
        self.lock()
            .idle_for()
    }

    /// Whether the port is still open.
    pub fn is_open(&self) -> bool {
        self.lock()
            .port
            .is_open()
    }

    /// Close the port. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut link = self.lock();
        if link.port.is_open() {
            debug!("Closing {}", self.name);
            link.port
                .close()?;
        }
        Ok(())
    }
}
