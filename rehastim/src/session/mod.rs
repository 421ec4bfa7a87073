//! Stimulator session.
//!
//! A [`Session`] owns the link to one Rehastim 2. Opening it performs the
//! device handshake and starts two background threads:
//!
//! - the reader, which re-frames incoming bytes and updates shared state
//! - the watchdog, which keeps the link alive while the caller is idle
//!
//! Callers block on a condition variable until the reply they want arrives,
//! a fatal fault is latched, or the session disconnects.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rehastim::{Command, Session, SessionConfig};
//!
//! fn main() -> rehastim::Result<()> {
//!     let mut session = Session::open("/dev/ttyUSB0", SessionConfig::default())?;
//!     let ack = session.issue(Command::GetStimulationMode, &[])?;
//!     println!("{:?}", ack.payload);
//!     session.disconnect()
//! }
//! ```

pub mod config;
pub mod correlator;
pub(crate) mod reader;
pub(crate) mod state;
pub mod transport;
pub(crate) mod watchdog;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{Level, debug, info, log, warn};

use crate::error::{Error, Fault, Result};
use crate::port::Port;
use crate::protocol::codec::PROTOCOL_VERSION;
use crate::protocol::{Classification, Command, CommandFrame};
use crate::telemetry::{ActualValuesSample, PhaseResult};

pub use config::{DeviceType, SessionConfig, Verbosity, WatchdogConfig};
pub use correlator::{AckCorrelator, Acknowledgement, Ticket};
pub use state::ConnectionState;
pub use transport::Transport;

use reader::ReaderSettings;
use state::Shared;
use watchdog::WatchdogScheduler;

/// Connected stimulator session.
pub struct Session {
    config: SessionConfig,
    shared: Arc<Shared>,
    transport: Arc<Transport>,
    reader: Option<JoinHandle<()>>,
    watchdog: Option<WatchdogScheduler>,
}

impl Session {
    /// Open the serial port `port_name` and connect.
    #[cfg(feature = "native")]
    pub fn open(port_name: &str, config: SessionConfig) -> Result<Self> {
        ensure_supported(config.device)?;
        let port = crate::port::NativePort::open(&crate::port::SerialConfig::new(port_name))?;
        Self::connect(Box::new(port), config)
    }

    /// Connect over an already open port.
    ///
    /// Waits for the device `Init`, answers it and starts the heartbeat.
    pub fn connect(port: Box<dyn Port>, config: SessionConfig) -> Result<Self> {
        ensure_supported(config.device)?;
        info!("Connecting to {} on {}", config.device, port.name());

        let transport = Arc::new(Transport::new(
            port,
            config
                .watchdog
                .send_gap_threshold,
        ));
        let shared = Arc::new(Shared::new(&config));
        shared.lock().connected = true;

        let reader = reader::spawn(
            Arc::clone(&shared),
            Arc::clone(&transport),
            ReaderSettings {
                poll_interval: config.poll_interval,
                verbosity: config.verbosity,
            },
        )?;
        let mut session = Self {
            config,
            shared,
            transport,
            reader: Some(reader),
            watchdog: None,
        };

        // Dropping the session on any error below tears the reader down.
        let init = session.wait_init_ack(Some(session.config.init_timeout))?;
        if protocol_version_matches(&init) {
            debug!("Device protocol version {PROTOCOL_VERSION}");
        } else {
            warn!(
                "Device announced protocol version {:?}, expected {PROTOCOL_VERSION}",
                init.payload.first()
            );
        }
        session.send(&CommandFrame::init_ack(0))?;
        session
            .shared
            .lock()
            .motomed_done = true;

        session.watchdog = Some(WatchdogScheduler::spawn(
            session
                .config
                .watchdog,
            Arc::clone(&session.shared),
            Arc::clone(&session.transport),
        )?);
        info!("Connected to {}", session.transport.name());
        Ok(session)
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Port name.
    pub fn port_name(&self) -> &str {
        self.transport
            .name()
    }

    /// Whether the link is up.
    pub fn is_connected(&self) -> bool {
        self.shared
            .is_connected()
    }

    /// Snapshot of the link status.
    pub fn connection_state(&self) -> ConnectionState {
        let state = self.shared.lock();
        ConnectionState {
            is_open: state.connected,
            is_heartbeat_active: state.heartbeat_active,
            since_last_command: self
                .transport
                .idle_for(),
            error_latched: state
                .latched
                .clone(),
        }
    }

    fn status_level(&self) -> Level {
        if self.config.verbosity >= Verbosity::Status {
            Level::Info
        } else {
            Level::Debug
        }
    }

    fn check_usable(&self) -> Result<()> {
        let state = self.shared.lock();
        if let Some(fault) = &state.latched {
            return Err(fault
                .clone()
                .into());
        }
        if !state.connected {
            return Err(Error::Disconnected);
        }
        Ok(())
    }

    /// Write a frame without waiting for a reply.
    pub fn send(&self, frame: &CommandFrame) -> Result<()> {
        self.check_usable()?;
        if frame.command() != Command::Watchdog {
            log!(self.status_level(), "Command sent: {}", frame.command());
        }
        self.transport
            .send(frame)?;
        Ok(())
    }

    /// Send `command` and block until its acknowledgement arrives.
    ///
    /// Fails without writing anything while a fault is latched.
    pub fn issue(&self, command: Command, payload: &[u8]) -> Result<Acknowledgement> {
        let ticket = {
            let mut state = self.shared.lock();
            if let Some(fault) = &state.latched {
                return Err(fault
                    .clone()
                    .into());
            }
            if !state.connected {
                return Err(Error::Disconnected);
            }
            state
                .correlator
                .register(command)
                .ok_or_else(|| Error::Protocol(format!("{command} is not acknowledged")))?
        };

        log!(self.status_level(), "Command sent: {command}");
        let frame = CommandFrame::with_payload(command, payload);
        let result = self
            .transport
            .send(&frame)
            .and_then(|_| {
                self.shared
                    .wait_for(command.name(), Some(self.config.ack_timeout), |s| {
                        s.correlator
                            .take(ticket)
                    })
            });
        if result.is_err() {
            self.shared
                .lock()
                .correlator
                .cancel(ticket);
        }
        result
    }

    /// Take the most recent acknowledgement, waiting for one if none is pending.
    pub fn wait_last_ack(&self, timeout: Option<Duration>) -> Result<Acknowledgement> {
        self.shared
            .wait_for("ack", timeout, |s| s.last_ack.take())
    }

    /// Take the most recent device `Init`, waiting for one if none is pending.
    pub fn wait_init_ack(&self, timeout: Option<Duration>) -> Result<Acknowledgement> {
        self.shared
            .wait_for("device Init", timeout, |s| s.last_init_ack.take())
    }

    /// Most recent acknowledgement of kind `ack`, without waiting.
    pub fn latest_ack(&self, ack: Command) -> Option<Acknowledgement> {
        self.shared
            .lock()
            .correlator
            .latest(ack)
            .cloned()
    }

    /// Latest `ActualValues` sample, waiting until one exists.
    pub fn get_latest_sample(&self) -> Result<ActualValuesSample> {
        self.shared
            .wait_for("ActualValues", None, |s| s.samples.latest().copied())
    }

    /// Latest `ActualValues` sample, if any.
    pub fn try_latest_sample(&self) -> Option<ActualValuesSample> {
        self.shared
            .lock()
            .samples
            .latest()
            .copied()
    }

    /// Retained samples, oldest first.
    pub fn samples(&self) -> Vec<ActualValuesSample> {
        self.shared
            .lock()
            .samples
            .iter()
            .copied()
            .collect()
    }

    /// Number of `ActualValues` samples received since connecting.
    pub fn samples_received(&self) -> u64 {
        self.shared
            .lock()
            .samples_received
    }

    /// Take a phase result that arrived since the last call, without waiting.
    pub fn take_phase_result(&self) -> Option<PhaseResult> {
        let mut state = self.shared.lock();
        if !std::mem::take(&mut state.phase_ready) {
            return None;
        }
        state
            .phase_results
            .latest()
            .copied()
    }

    /// Wait for the next phase result and return it.
    pub fn get_latest_phase_result(&self) -> Result<PhaseResult> {
        self.shared
            .wait_for("PhaseResult", None, |s| {
                if !s.phase_ready {
                    return None;
                }
                s.phase_ready = false;
                s.phase_results
                    .latest()
                    .copied()
            })
    }

    /// Retained phase results, oldest first.
    pub fn phase_results(&self) -> Vec<PhaseResult> {
        self.shared
            .lock()
            .phase_results
            .iter()
            .copied()
            .collect()
    }

    /// Wait until the MOTOmed reports the last command done.
    pub fn wait_motomed_done(&self, timeout: Option<Duration>) -> Result<()> {
        self.shared
            .wait_for("MotomedCommandDone", timeout, |s| {
                std::mem::take(&mut s.motomed_done).then_some(())
            })
    }

    /// Most recent MOTOmed error report.
    pub fn last_motomed_error(&self) -> Option<Classification> {
        self.shared
            .lock()
            .last_motomed_error
    }

    /// Latched fault, if any.
    pub fn fault(&self) -> Option<Fault> {
        self.shared
            .lock()
            .latched
            .clone()
    }

    /// Clear the latched fault so commands can be issued again.
    pub fn reset_fault(&self) {
        if let Some(fault) = self
            .shared
            .lock()
            .latched
            .take()
        {
            info!("Cleared fault: {fault}");
        }
    }

    /// Stop the background threads and close the port.
    ///
    /// Blocked callers wake with [`Error::Disconnected`]. Calling this twice
    /// is a no-op.
    pub fn disconnect(&mut self) -> Result<()> {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.stop();
        }

        let was_connected = {
            let mut state = self.shared.lock();
            let was = state.connected;
            state.connected = false;
            state.with_motomed = false;
            was
        };
        self.shared
            .notify();

        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                warn!("Reader thread panicked");
            }
        }
        self.shared
            .lock()
            .clear_buffers();
        self.transport
            .close()?;

        if was_connected {
            info!("Disconnected from {}", self.transport.name());
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            debug!("Disconnect on drop failed: {e}");
        }
    }
}

fn protocol_version_matches(init: &Acknowledgement) -> bool {
    init.payload.first() == Some(&PROTOCOL_VERSION)
}

fn ensure_supported(device: DeviceType) -> Result<()> {
    if device.is_supported() {
        Ok(())
    } else {
        Err(Error::Unsupported(format!(
            "{device} is driven through its vendor library"
        )))
    }
}
