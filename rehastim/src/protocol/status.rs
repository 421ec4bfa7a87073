//! Device status codes and their classification.
//!
//! The stimulator reports failures as signed one-byte codes. The same value
//! means different things depending on which packet carried it, so each
//! packet kind has its own table.

use crate::protocol::command::Command;

/// How a status code affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation succeeded.
    Ok,
    /// Logged, operation continues.
    Advisory,
    /// Logged and recorded for the caller, session stays usable.
    Error,
    /// Latches the session.
    Fatal,
}

/// A decoded status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Signed code as sent by the device.
    pub code: i8,
    /// Human-readable description.
    pub message: &'static str,
    /// Effect on the session.
    pub severity: Severity,
}

impl Classification {
    fn new(code: i8, message: &'static str, severity: Severity) -> Self {
        Self {
            code,
            message,
            severity,
        }
    }

    /// Whether the code latches the session.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

/// Stimulation error codes that stop the stimulator.
pub const FATAL_STIMULATION_CODES: [i8; 3] = [-1, -2, -3];

/// MOTOmed error codes that are reported but do not interrupt training.
pub const ADVISORY_MOTOMED_CODES: [i8; 2] = [-4, -6];

/// Classify the status of a `StimulationError` packet.
pub fn stimulation_error(code: i8) -> Classification {
    let message = match code {
        -1 => "Emergency switch activated or not connected",
        -2 => "Electrode error",
        -3 => "Stimulation module error",
        _ => "Unknown stimulation error",
    };
    let severity = if FATAL_STIMULATION_CODES.contains(&code) {
        Severity::Fatal
    } else {
        Severity::Advisory
    };
    Classification::new(code, message, severity)
}

/// Classify the status of a `MotomedError` packet.
pub fn motomed_error(code: i8) -> Classification {
    let message = match code {
        0 => "No error",
        -1 => "Transfer error",
        -2 => "Parameter error",
        -3 => "Wrong mode error",
        -4 => "MOTOmed connection error",
        -5 => "MOTOmed busy error",
        -6 => "MOTOmed not ready",
        _ => "Unknown MOTOmed error",
    };
    let severity = match code {
        0 => Severity::Ok,
        c if ADVISORY_MOTOMED_CODES.contains(&c) => Severity::Advisory,
        _ => Severity::Error,
    };
    Classification::new(code, message, severity)
}

/// Stimulation mode reported by `GetStimulationModeAck`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StimulationMode {
    /// Idle, nothing initialised.
    Start,
    /// Channel list mode initialised.
    Initialized,
    /// Channel list mode running.
    Started,
}

impl StimulationMode {
    /// Decode the mode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Start),
            1 => Some(Self::Initialized),
            2 => Some(Self::Started),
            _ => None,
        }
    }

    /// Message used in handshake logs.
    pub fn message(self) -> &'static str {
        match self {
            Self::Start => "Start Mode",
            Self::Initialized => "Stimulation initialized",
            Self::Started => "Stimulation started",
        }
    }
}

/// Outcome of a handshake acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeCheck {
    /// Message decoded from the ack.
    pub message: &'static str,
    /// Message the ack carries on success.
    pub expected: &'static str,
}

impl HandshakeCheck {
    /// Whether the decoded message is the success message.
    pub fn is_success(&self) -> bool {
        self.message == self.expected
    }
}

/// Decode the result of a channel-list mode ack.
///
/// Returns `None` for acks that carry no handshake result.
pub fn handshake_ack(command: Command, payload: &[u8]) -> Option<HandshakeCheck> {
    let code = payload.first().map_or(-1, |&b| b as i8);
    let (expected, message) = match command {
        Command::InitChannelListModeAck => (
            "Stimulation initialized",
            match code {
                0 => "Stimulation initialized",
                -1 => "Transfer error",
                -2 => "Parameter error",
                -3 => "Wrong mode error",
                -8 => "Busy error",
                _ => "Unknown error",
            },
        ),
        Command::StartChannelListModeAck => (
            "Stimulation started",
            match code {
                0 => "Stimulation started",
                -1 => "Transfer error",
                -2 => "Parameter error",
                -3 => "Wrong mode error",
                -8 => "Busy error",
                _ => "Unknown error",
            },
        ),
        Command::StopChannelListModeAck => (
            "Stimulation stopped",
            match code {
                0 => "Stimulation stopped",
                -1 => "Transfer error",
                _ => "Unknown error",
            },
        ),
        _ => return None,
    };
    Some(HandshakeCheck { message, expected })
}

/// Decode a `GetStimulationModeAck` payload into a log message.
///
/// The reply is informational only, so an unknown mode is never a failure.
pub fn get_mode_ack(payload: &[u8]) -> &'static str {
    match payload.first().map(|&b| b as i8) {
        Some(0) => payload
            .get(1)
            .and_then(|&b| StimulationMode::from_byte(b))
            .map_or("Unknown mode", StimulationMode::message),
        Some(-1) => "Transfer error",
        Some(-8) => "Busy error",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stimulation_fatal_set() {
        for code in FATAL_STIMULATION_CODES {
            assert!(stimulation_error(code).is_fatal(), "{code}");
        }
        assert_eq!(stimulation_error(-2).message, "Electrode error");
        assert_eq!(stimulation_error(-7).severity, Severity::Advisory);
    }

    #[test]
    fn test_motomed_advisory_set() {
        assert_eq!(motomed_error(-4).severity, Severity::Advisory);
        assert_eq!(motomed_error(-6).severity, Severity::Advisory);
        assert_eq!(motomed_error(-2).severity, Severity::Error);
        assert!(!motomed_error(-2).is_fatal());
        assert_eq!(motomed_error(0).severity, Severity::Ok);
    }

    #[test]
    fn test_handshake_success_messages() {
        let ok = handshake_ack(Command::InitChannelListModeAck, &[0]).unwrap();
        assert!(ok.is_success());
        assert_eq!(ok.message, "Stimulation initialized");

        let started = handshake_ack(Command::StartChannelListModeAck, &[0]).unwrap();
        assert!(started.is_success());

        let stopped = handshake_ack(Command::StopChannelListModeAck, &[0]).unwrap();
        assert!(stopped.is_success());
    }

    #[test]
    fn test_handshake_failure_messages() {
        let busy = handshake_ack(Command::StartChannelListModeAck, &[(-8i8) as u8]).unwrap();
        assert!(!busy.is_success());
        assert_eq!(busy.message, "Busy error");

        let empty = handshake_ack(Command::StopChannelListModeAck, &[]).unwrap();
        assert_eq!(empty.message, "Transfer error");
        assert!(!empty.is_success());
    }

    #[test]
    fn test_get_mode_ack() {
        assert_eq!(get_mode_ack(&[0, 2]), "Stimulation started");
        assert_eq!(get_mode_ack(&[0, 0]), "Start Mode");
        assert_eq!(get_mode_ack(&[0]), "Unknown mode");
        assert_eq!(get_mode_ack(&[(-8i8) as u8]), "Busy error");
        assert!(handshake_ack(Command::GetStimulationModeAck, &[0]).is_none());
    }

    #[test]
    fn test_non_handshake_ack() {
        assert!(handshake_ack(Command::SetGearAck, &[0]).is_none());
    }
}
