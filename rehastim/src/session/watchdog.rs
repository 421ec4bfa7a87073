//! Heartbeat thread.
//!
//! The device stops stimulating when the host goes quiet, so while a session
//! is connected this thread writes a `Watchdog` whenever nothing else was
//! sent for longer than the idle threshold.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::session::config::WatchdogConfig;
use crate::session::state::Shared;
use crate::session::transport::Transport;

/// Running heartbeat thread.
pub(crate) struct WatchdogScheduler {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl WatchdogScheduler {
    /// Start ticking.
    pub fn spawn(
        config: WatchdogConfig,
        shared: Arc<Shared>,
        transport: Arc<Transport>,
    ) -> Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("rehastim-watchdog".into())
            .spawn(move || {
                debug!("Watchdog started, tick {:?}", config.tick);
                shared.lock().heartbeat_active = true;
                loop {
                    match stopped.recv_timeout(config.tick) {
                        Err(RecvTimeoutError::Timeout) => {},
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    if !shared.is_connected() {
                        debug!("Session no longer connected");
                        break;
                    }
                    match transport.heartbeat_if_idle(config.idle_threshold) {
                        Ok(true) => trace!("Heartbeat sent"),
                        Ok(false) => {},
                        Err(Error::Disconnected) => break,
                        Err(e) => warn!("Heartbeat failed: {e}"),
                    }
                }
                shared.lock().heartbeat_active = false;
                debug!("Watchdog stopped");
            })?;
        Ok(Self { stop, handle })
    }

    /// Stop ticking and wait for the thread to exit.
    pub fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("Watchdog thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MemoryPort;
    use crate::protocol::Command;
    use crate::session::config::SessionConfig;
    use crate::session::transport::tests::written_commands;
    use std::time::{Duration, Instant};

    fn connected_shared() -> Arc<Shared> {
        let shared = Arc::new(Shared::new(&SessionConfig::default()));
        shared.lock().connected = true;
        shared
    }

    fn fast_config() -> WatchdogConfig {
        WatchdogConfig {
            tick: Duration::from_millis(10),
            idle_threshold: Duration::from_millis(5),
            send_gap_threshold: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_ticks_send_heartbeats_and_stop() {
        let (port, link) = MemoryPort::new("mem");
        let transport = Arc::new(Transport::new(Box::new(port), Duration::from_secs(60)));
        let shared = connected_shared();

        let watchdog =
            WatchdogScheduler::spawn(fast_config(), Arc::clone(&shared), transport).unwrap();
        thread::sleep(Duration::from_millis(100));
        watchdog.stop();

        let sent = written_commands(&link.written());
        assert!(sent.len() >= 2, "only {} heartbeats", sent.len());
        assert!(sent.iter().all(|&c| c == Command::Watchdog));
        assert!(!shared.lock().heartbeat_active);
    }

    #[test]
    fn test_busy_link_needs_no_heartbeat() {
        let (port, link) = MemoryPort::new("mem");
        let transport = Arc::new(Transport::new(Box::new(port), Duration::from_secs(60)));
        let shared = connected_shared();
        let config = WatchdogConfig {
            idle_threshold: Duration::from_secs(60),
            ..fast_config()
        };
        transport.heartbeat_if_idle(Duration::ZERO).unwrap();
        link.take_written();

        let watchdog = WatchdogScheduler::spawn(config, shared, transport).unwrap();
        thread::sleep(Duration::from_millis(50));
        watchdog.stop();
        assert!(link.written().is_empty());
    }

    #[test]
    fn test_stops_when_session_disconnects() {
        let (port, link) = MemoryPort::new("mem");
        let transport = Arc::new(Transport::new(Box::new(port), Duration::from_secs(60)));
        let shared = connected_shared();
        let watchdog =
            WatchdogScheduler::spawn(fast_config(), Arc::clone(&shared), transport).unwrap();
        thread::sleep(Duration::from_millis(50));

        shared.lock().connected = false;
        let deadline = Instant::now() + Duration::from_secs(2);
        while shared.lock().heartbeat_active {
            assert!(Instant::now() < deadline, "watchdog kept running");
            thread::sleep(Duration::from_millis(5));
        }
        link.take_written();
        thread::sleep(Duration::from_millis(100));
        assert!(link.written().is_empty());
        watchdog.stop();
    }
}
