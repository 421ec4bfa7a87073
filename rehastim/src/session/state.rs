//! State shared between the caller and the background threads.
//!
//! One mutex guards everything the reader updates. Blocking getters wait on
//! the paired condition variable and re-check the fault latch and the
//! connection flag on every wake-up.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::error;

use crate::error::{Error, Fault, Result};
use crate::protocol::Classification;
use crate::session::config::SessionConfig;
use crate::session::correlator::{AckCorrelator, Acknowledgement};
use crate::telemetry::{ActualValuesSample, PhaseResult, RingBuffer};

/// Longest uninterrupted condition wait before the interrupt hook is polled.
const INTERRUPT_POLL: Duration = Duration::from_millis(100);

/// Snapshot of the link status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionState {
    /// The port is open and the reader is running.
    pub is_open: bool,
    /// The heartbeat thread is running.
    pub is_heartbeat_active: bool,
    /// Time since the last write.
    pub since_last_command: Option<Duration>,
    /// Latched fault, if any.
    pub error_latched: Option<Fault>,
}

pub(crate) struct State {
    pub connected: bool,
    pub heartbeat_active: bool,
    pub with_motomed: bool,
    pub correlator: AckCorrelator,
    pub samples: RingBuffer<ActualValuesSample>,
    pub samples_received: u64,
    pub phase_results: RingBuffer<PhaseResult>,
    pub phase_ready: bool,
    pub motomed_done: bool,
    pub last_ack: Option<Acknowledgement>,
    pub last_init_ack: Option<Acknowledgement>,
    pub last_motomed_error: Option<Classification>,
    pub latched: Option<Fault>,
}

impl State {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            connected: false,
            heartbeat_active: false,
            with_motomed: config.with_motomed,
            correlator: AckCorrelator::new(),
            samples: RingBuffer::new(config.max_samples),
            samples_received: 0,
            phase_results: RingBuffer::new(config.max_phase_results),
            phase_ready: false,
            motomed_done: false,
            last_ack: None,
            last_init_ack: None,
            last_motomed_error: None,
            latched: None,
        }
    }

    /// Latch `fault`. The first fault wins until reset.
    pub fn latch(&mut self, fault: Fault) {
        if self.latched.is_none() {
            error!("Session latched: {fault}");
            self.latched = Some(fault);
        }
    }

    /// Drop everything received during the session.
    pub fn clear_buffers(&mut self) {
        self.correlator.clear();
        self.samples.clear();
        self.phase_results.clear();
        self.phase_ready = false;
        self.last_ack = None;
        self.last_init_ack = None;
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    signal: Condvar,
}

impl Shared {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            state: Mutex::new(State::new(config)),
            signal: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every blocked getter.
    pub fn notify(&self) {
        self.signal
            .notify_all();
    }

    pub fn is_connected(&self) -> bool {
        self.lock()
            .connected
    }

    /// Block until `ready` yields a value.
    ///
    /// Fails immediately on a latched fault, when the session disconnects,
    /// when the embedding application requests an interrupt, or once
    /// `timeout` elapses.
    pub fn wait_for<T>(
        &self,
        what: &str,
        timeout: Option<Duration>,
        mut ready: impl FnMut(&mut State) -> Option<T>,
    ) -> Result<T> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.lock();
        loop {
            if let Some(fault) = &state.latched {
                return Err(fault
                    .clone()
                    .into());
            }
            if let Some(value) = ready(&mut state) {
                return Ok(value);
            }
            if !state.connected {
                return Err(Error::Disconnected);
            }
            if crate::is_interrupted_requested() {
                return Err(Error::Interrupted(format!("waiting for {what}")));
            }

            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(Error::Timeout(format!(
                            "no {what} within {:?}",
                            timeout.unwrap_or_default()
                        )));
                    }
                    (deadline - now).min(INTERRUPT_POLL)
                },
                None => INTERRUPT_POLL,
            };
            state = self
                .signal
                .wait_timeout(state, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
