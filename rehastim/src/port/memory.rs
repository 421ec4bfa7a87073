//! In-process loopback port.
//!
//! [`MemoryPort`] stands in for the serial device. Bytes pushed through the
//! paired [`MemoryLink`] appear on the read side, and everything the engine
//! writes is captured. An optional responder plays the device: it sees each
//! written buffer and returns the bytes the device would answer with.

use {
    crate::{
        error::{Error, Result},
        port::Port,
        protocol::codec::BAUD_RATE,
    },
    std::{
        collections::VecDeque,
        io::{Read, Write},
        sync::{Arc, Mutex, MutexGuard, PoisonError},
        time::Duration,
    },
};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct LinkState {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    responder: Option<Responder>,
    closed: bool,
    fail_writes: bool,
}

/// Test-side handle of a [`MemoryPort`].
#[derive(Clone, Default)]
pub struct MemoryLink {
    state: Arc<Mutex<LinkState>>,
}

impl MemoryLink {
    fn lock(&self) -> MutexGuard<'_, LinkState> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue bytes for the port to read.
    pub fn inject(&self, bytes: &[u8]) {
        self.lock()
            .rx
            .extend(bytes);
    }

    /// Everything written so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock()
            .tx
            .clone()
    }

    /// Everything written so far, clearing the capture.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.lock().tx)
    }

    /// Answer every write with the bytes `responder` returns.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.lock()
            .responder = Some(Box::new(responder));
    }

    /// Make subsequent writes fail with a broken pipe.
    pub fn fail_writes(&self, fail: bool) {
        self.lock()
            .fail_writes = fail;
    }

    /// Whether the port side has been closed.
    pub fn is_closed(&self) -> bool {
        self.lock()
            .closed
    }
}

/// In-memory [`Port`] paired with a [`MemoryLink`].
pub struct MemoryPort {
    name: String,
    link: MemoryLink,
}

impl MemoryPort {
    /// Create a port and the link that drives it.
    pub fn new(name: impl Into<String>) -> (Self, MemoryLink) {
        let link = MemoryLink::default();
        let port = Self {
            name: name.into(),
            link: link.clone(),
        };
        (port, link)
    }
}

impl Port for MemoryPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> u32 {
        BAUD_RATE
    }

    fn set_timeout(&mut self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let state = self.link.lock();
        if state.closed {
            return Err(Error::Disconnected);
        }
        Ok(state.rx.len())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.link
            .lock()
            .rx
            .clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.link.is_closed()
    }

    fn close(&mut self) -> Result<()> {
        self.link
            .lock()
            .closed = true;
        Ok(())
    }
}

impl Read for MemoryPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut state = self.link.lock();
        if state.closed {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"));
        }
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut state = self.link.lock();
        if state.closed {
            return Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "port closed"));
        }
        if state.fail_writes {
            return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "write rejected"));
        }
        state.tx.extend_from_slice(buf);
        if let Some(mut responder) = state.responder.take() {
            let reply = responder(buf);
            state.rx.extend(reply);
            state.responder = Some(responder);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_read_available() {
        let (mut port, link) = MemoryPort::new("mem0");
        assert!(port.read_available().unwrap().is_empty());
        link.inject(&[1, 2, 3]);
        assert_eq!(port.bytes_to_read().unwrap(), 3);
        assert_eq!(port.read_available().unwrap(), vec![1, 2, 3]);
        assert_eq!(port.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_written_capture_and_responder() {
        let (mut port, link) = MemoryPort::new("mem0");
        link.set_responder(|written| written.iter().rev().copied().collect());
        port.write_all_bytes(&[1, 2]).unwrap();
        assert_eq!(link.written(), vec![1, 2]);
        assert_eq!(port.read_available().unwrap(), vec![2, 1]);
        assert_eq!(link.take_written(), vec![1, 2]);
        assert!(link.written().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut port, link) = MemoryPort::new("mem0");
        port.close().unwrap();
        port.close().unwrap();
        assert!(!port.is_open());
        assert!(link.is_closed());
        assert!(port.write_all_bytes(&[0]).is_err());
        assert!(matches!(port.bytes_to_read(), Err(Error::Disconnected)));
    }

    #[test]
    fn test_failed_writes() {
        let (mut port, link) = MemoryPort::new("mem0");
        link.fail_writes(true);
        assert!(matches!(port.write_all_bytes(&[0]), Err(Error::Io(_))));
        link.fail_writes(false);
        port.write_all_bytes(&[0]).unwrap();
    }
}
