//! Background reader: pull bytes, re-frame, dispatch.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{Level, debug, error, info, log, trace, warn};

use crate::error::Fault;
use crate::protocol::status::{self, Severity};
use crate::protocol::{Command, Packet, PacketFramer};
use crate::session::config::Verbosity;
use crate::session::correlator::Acknowledgement;
use crate::session::state::{Shared, State};
use crate::session::transport::Transport;
use crate::telemetry::{ActualValuesSample, PhaseResult};

/// Reader settings copied out of the session configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReaderSettings {
    pub poll_interval: Duration,
    pub verbosity: Verbosity,
}

fn status_level(verbosity: Verbosity) -> Level {
    if verbosity >= Verbosity::Status {
        Level::Info
    } else {
        Level::Debug
    }
}

/// Run until the session disconnects or the port fails.
pub(crate) fn run(shared: &Shared, transport: &Transport, settings: ReaderSettings) {
    debug!("Reader started on {}", transport.name());
    let mut framer = PacketFramer::new();

    while shared.is_connected() {
        let bytes = match transport.read_available() {
            Ok(bytes) => bytes,
            Err(e) => {
                let mut state = shared.lock();
                if state.connected {
                    error!("Reading {} failed: {e}", transport.name());
                    state.connected = false;
                }
                drop(state);
                shared.notify();
                break;
            },
        };
        if bytes.is_empty() {
            thread::sleep(settings.poll_interval);
            continue;
        }

        let spans = framer.push(&bytes);
        if spans.is_empty() {
            continue;
        }
        let mut state = shared.lock();
        for raw in spans {
            match Packet::parse(&raw) {
                Ok(packet) => {
                    if settings.verbosity == Verbosity::Full {
                        info!("RX {raw:02X?}");
                    }
                    dispatch(&mut state, &packet, settings.verbosity);
                },
                Err(e) => trace!("Dropping span {raw:02X?}: {e}"),
            }
        }
        drop(state);
        shared.notify();
    }

    debug!("Reader stopped");
}

/// Apply one packet to the session state.
pub(crate) fn dispatch(state: &mut State, packet: &Packet, verbosity: Verbosity) {
    let Some(command) = packet.command() else {
        debug!("Ignoring unknown command code {:#04x}", packet.code());
        return;
    };

    match command {
        Command::ActualValues => {
            if !state.with_motomed {
                state.latch(Fault::ConfigurationMismatch(
                    "MOTOmed telemetry received but the session was opened without a MOTOmed"
                        .into(),
                ));
                return;
            }
            match ActualValuesSample::decode(packet) {
                Ok(sample) => {
                    state
                        .samples
                        .push(sample);
                    state.samples_received += 1;
                },
                Err(e) => debug!("Dropping ActualValues: {e}"),
            }
        },
        Command::PhaseResult => match PhaseResult::decode(packet) {
            Ok(result) => {
                log!(status_level(verbosity), "Phase {} finished", result.phase_number);
                state
                    .phase_results
                    .push(result);
                state.phase_ready = true;
            },
            Err(e) => debug!("Dropping PhaseResult: {e}"),
        },
        Command::MotomedCommandDone => {
            trace!("MOTOmed command done");
            state.motomed_done = true;
        },
        Command::MotomedError => {
            let class = status::motomed_error(packet.status().unwrap_or(0));
            match class.severity {
                Severity::Ok => debug!("MOTOmed reports no error"),
                Severity::Advisory => warn!("MOTOmed {}: {}", class.code, class.message),
                Severity::Error | Severity::Fatal => {
                    error!("MOTOmed {}: {}", class.code, class.message);
                },
            }
            state.last_motomed_error = Some(class);
        },
        Command::StimulationError => {
            let class = status::stimulation_error(packet.status().unwrap_or(0));
            if class.is_fatal() {
                state.latch(Fault::Stimulation {
                    code: class.code,
                    message: class.message,
                });
            } else {
                warn!("Stimulation {}: {}", class.code, class.message);
            }
        },
        Command::Init => {
            log!(status_level(verbosity), "Device Init received");
            state.last_init_ack = Acknowledgement::from_packet(packet);
        },
        Command::UnknownCommand => {
            warn!("Device did not understand the last command");
            state.last_ack = Acknowledgement::from_packet(packet);
        },
        _ => {
            let Some(ack) = Acknowledgement::from_packet(packet) else {
                return;
            };
            log!(status_level(verbosity), "Ack received: {command}");
            if command == Command::GetStimulationModeAck {
                log!(status_level(verbosity), "Stimulator mode: {}", status::get_mode_ack(&ack.payload));
            } else if let Some(check) = status::handshake_ack(command, &ack.payload) {
                if !check.is_success() {
                    state.latch(Fault::ConfigurationMismatch(format!(
                        "{command}: {} (expected {})",
                        check.message, check.expected
                    )));
                }
            }
            state
                .correlator
                .on_ack(ack.clone());
            state.last_ack = Some(ack);
        },
    }
}

/// Spawn the reader thread.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    transport: Arc<Transport>,
    settings: ReaderSettings,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("rehastim-reader".into())
        .spawn(move || run(&shared, &transport, settings))
}
