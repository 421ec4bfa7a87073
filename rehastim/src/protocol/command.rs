//! ScienceMode 2 command identifiers.
//!
//! Outbound commands and inbound replies share one identifier space. Most
//! request/reply exchanges follow the `reply = request + 1` convention;
//! periodic reports and error notifications use their own fixed codes.

use std::fmt;

/// ScienceMode 2 command identifiers (Rehastim 2 and MOTOmed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Command {
    /// Device announces itself and its protocol version (0x01).
    Init = 0x01,
    /// Host answers the device `Init` (0x02).
    InitAck = 0x02,
    /// Device did not understand the last command (0x03).
    UnknownCommand = 0x03,
    /// Host heartbeat (0x04).
    Watchdog = 0x04,

    /// Query the current stimulation mode (0x0A).
    GetStimulationMode = 0x0A,
    /// Reply to [`Command::GetStimulationMode`] (0x0B).
    GetStimulationModeAck = 0x0B,
    /// Initialise channel list mode (0x1E).
    InitChannelListMode = 0x1E,
    /// Reply to [`Command::InitChannelListMode`] (0x1F).
    InitChannelListModeAck = 0x1F,
    /// Start or update channel list mode stimulation (0x20).
    StartChannelListMode = 0x20,
    /// Reply to [`Command::StartChannelListMode`] (0x21).
    StartChannelListModeAck = 0x21,
    /// Stop channel list mode (0x22).
    StopChannelListMode = 0x22,
    /// Reply to [`Command::StopChannelListMode`] (0x23).
    StopChannelListModeAck = 0x23,
    /// Emit a single pulse (0x24).
    SinglePulse = 0x24,
    /// Reply to [`Command::SinglePulse`] (0x25).
    SinglePulseAck = 0x25,
    /// Device-side stimulation failure notification (0x26).
    StimulationError = 0x26,

    /// MOTOmed: prepare a phase training.
    InitPhaseTraining = 50,
    /// Reply to [`Command::InitPhaseTraining`].
    InitPhaseTrainingAck = 51,
    /// MOTOmed: start a training phase.
    StartPhase = 52,
    /// Reply to [`Command::StartPhase`].
    StartPhaseAck = 53,
    /// MOTOmed: pause the current phase.
    PausePhase = 54,
    /// Reply to [`Command::PausePhase`].
    PausePhaseAck = 55,
    /// MOTOmed: stop the phase training.
    StopPhaseTraining = 56,
    /// Reply to [`Command::StopPhaseTraining`].
    StopPhaseTrainingAck = 57,
    /// MOTOmed: phase result report.
    PhaseResult = 58,
    /// MOTOmed: periodic angle/speed/torque report.
    ActualValues = 60,
    /// MOTOmed: set rotation direction.
    SetRotationDirection = 62,
    /// Reply to [`Command::SetRotationDirection`].
    SetRotationDirectionAck = 63,
    /// MOTOmed: set speed.
    SetSpeed = 64,
    /// Reply to [`Command::SetSpeed`].
    SetSpeedAck = 65,
    /// MOTOmed: set gear (resistance).
    SetGear = 66,
    /// Reply to [`Command::SetGear`].
    SetGearAck = 67,
    /// MOTOmed: lock or unlock the keyboard.
    SetKeyboardLock = 68,
    /// Reply to [`Command::SetKeyboardLock`].
    SetKeyboardLockAck = 69,
    /// MOTOmed: start basic training.
    StartBasicTraining = 70,
    /// Reply to [`Command::StartBasicTraining`].
    StartBasicTrainingAck = 71,
    /// MOTOmed: pause basic training.
    PauseBasicTraining = 72,
    /// Reply to [`Command::PauseBasicTraining`].
    PauseBasicTrainingAck = 73,
    /// MOTOmed: continue basic training.
    ContinueBasicTraining = 74,
    /// Reply to [`Command::ContinueBasicTraining`].
    ContinueBasicTrainingAck = 75,
    /// MOTOmed: stop basic training.
    StopBasicTraining = 76,
    /// Reply to [`Command::StopBasicTraining`].
    StopBasicTrainingAck = 77,
    /// MOTOmed finished executing the last command.
    MotomedCommandDone = 89,
    /// MOTOmed error notification.
    MotomedError = 90,
}

const ALL: &[Command] = &[
    Command::Init,
    Command::InitAck,
    Command::UnknownCommand,
    Command::Watchdog,
    Command::GetStimulationMode,
    Command::GetStimulationModeAck,
    Command::InitChannelListMode,
    Command::InitChannelListModeAck,
    Command::StartChannelListMode,
    Command::StartChannelListModeAck,
    Command::StopChannelListMode,
    Command::StopChannelListModeAck,
    Command::SinglePulse,
    Command::SinglePulseAck,
    Command::StimulationError,
    Command::InitPhaseTraining,
    Command::InitPhaseTrainingAck,
    Command::StartPhase,
    Command::StartPhaseAck,
    Command::PausePhase,
    Command::PausePhaseAck,
    Command::StopPhaseTraining,
    Command::StopPhaseTrainingAck,
    Command::PhaseResult,
    Command::ActualValues,
    Command::SetRotationDirection,
    Command::SetRotationDirectionAck,
    Command::SetSpeed,
    Command::SetSpeedAck,
    Command::SetGear,
    Command::SetGearAck,
    Command::SetKeyboardLock,
    Command::SetKeyboardLockAck,
    Command::StartBasicTraining,
    Command::StartBasicTrainingAck,
    Command::PauseBasicTraining,
    Command::PauseBasicTrainingAck,
    Command::ContinueBasicTraining,
    Command::ContinueBasicTrainingAck,
    Command::StopBasicTraining,
    Command::StopBasicTrainingAck,
    Command::MotomedCommandDone,
    Command::MotomedError,
];

impl Command {
    /// Wire code of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Look up a command by its wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        ALL.iter().copied().find(|c| c.code() == code)
    }

    /// All known commands, in code order.
    pub fn all() -> &'static [Self] {
        ALL
    }

    /// The reply the device sends for this command, if it sends one.
    ///
    /// Heartbeats and the host's `InitAck` are fire-and-forget.
    pub fn ack(self) -> Option<Self> {
        match self {
            Self::Watchdog | Self::InitAck => None,
            _ if self.is_report() || self.is_ack() => None,
            _ => Self::from_code(self.code().wrapping_add(1)),
        }
    }

    /// Whether a caller issuing this command should wait for a reply.
    pub fn expects_ack(self) -> bool {
        self.ack().is_some()
    }

    /// Whether this identifier is only ever sent by the device as a reply.
    pub fn is_ack(self) -> bool {
        matches!(
            self,
            Self::InitAck
                | Self::GetStimulationModeAck
                | Self::InitChannelListModeAck
                | Self::StartChannelListModeAck
                | Self::StopChannelListModeAck
                | Self::SinglePulseAck
                | Self::InitPhaseTrainingAck
                | Self::StartPhaseAck
                | Self::PausePhaseAck
                | Self::StopPhaseTrainingAck
                | Self::SetRotationDirectionAck
                | Self::SetSpeedAck
                | Self::SetGearAck
                | Self::SetKeyboardLockAck
                | Self::StartBasicTrainingAck
                | Self::PauseBasicTrainingAck
                | Self::ContinueBasicTrainingAck
                | Self::StopBasicTrainingAck
        )
    }

    /// Whether this identifier is an unsolicited device report.
    pub fn is_report(self) -> bool {
        matches!(
            self,
            Self::Init
                | Self::UnknownCommand
                | Self::StimulationError
                | Self::PhaseResult
                | Self::ActualValues
                | Self::MotomedCommandDone
                | Self::MotomedError
        )
    }

    /// Whether this command is addressed to the MOTOmed.
    pub fn is_motomed(self) -> bool {
        self.code() >= Self::InitPhaseTraining.code()
    }

    /// Command name as used in protocol logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::Init => "Init",
            Self::InitAck => "InitAck",
            Self::UnknownCommand => "UnknownCommand",
            Self::Watchdog => "Watchdog",
            Self::GetStimulationMode => "GetStimulationMode",
            Self::GetStimulationModeAck => "GetStimulationModeAck",
            Self::InitChannelListMode => "InitChannelListMode",
            Self::InitChannelListModeAck => "InitChannelListModeAck",
            Self::StartChannelListMode => "StartChannelListMode",
            Self::StartChannelListModeAck => "StartChannelListModeAck",
            Self::StopChannelListMode => "StopChannelListMode",
            Self::StopChannelListModeAck => "StopChannelListModeAck",
            Self::SinglePulse => "SinglePulse",
            Self::SinglePulseAck => "SinglePulseAck",
            Self::StimulationError => "StimulationError",
            Self::InitPhaseTraining => "InitPhaseTraining",
            Self::InitPhaseTrainingAck => "InitPhaseTrainingAck",
            Self::StartPhase => "StartPhase",
            Self::StartPhaseAck => "StartPhaseAck",
            Self::PausePhase => "PausePhase",
            Self::PausePhaseAck => "PausePhaseAck",
            Self::StopPhaseTraining => "StopPhaseTraining",
            Self::StopPhaseTrainingAck => "StopPhaseTrainingAck",
            Self::PhaseResult => "PhaseResult",
            Self::ActualValues => "ActualValues",
            Self::SetRotationDirection => "SetRotationDirection",
            Self::SetRotationDirectionAck => "SetRotationDirectionAck",
            Self::SetSpeed => "SetSpeed",
            Self::SetSpeedAck => "SetSpeedAck",
            Self::SetGear => "SetGear",
            Self::SetGearAck => "SetGearAck",
            Self::SetKeyboardLock => "SetKeyboardLock",
            Self::SetKeyboardLockAck => "SetKeyboardLockAck",
            Self::StartBasicTraining => "StartBasicTraining",
            Self::StartBasicTrainingAck => "StartBasicTrainingAck",
            Self::PauseBasicTraining => "PauseBasicTraining",
            Self::PauseBasicTrainingAck => "PauseBasicTrainingAck",
            Self::ContinueBasicTraining => "ContinueBasicTraining",
            Self::ContinueBasicTrainingAck => "ContinueBasicTrainingAck",
            Self::StopBasicTraining => "StopBasicTraining",
            Self::StopBasicTrainingAck => "StopBasicTrainingAck",
            Self::MotomedCommandDone => "MotomedCommandDone",
            Self::MotomedError => "MotomedError",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        Self::from_code(code).ok_or(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip() {
        for &cmd in Command::all() {
            assert_eq!(Command::from_code(cmd.code()), Some(cmd));
        }
        assert_eq!(Command::from_code(0x00), None);
        assert_eq!(Command::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_ack_is_code_plus_one() {
        assert_eq!(
            Command::InitChannelListMode.ack(),
            Some(Command::InitChannelListModeAck)
        );
        assert_eq!(Command::SetGear.ack(), Some(Command::SetGearAck));
        assert_eq!(
            Command::GetStimulationMode.ack(),
            Some(Command::GetStimulationModeAck)
        );
        for &cmd in Command::all() {
            if let Some(ack) = cmd.ack() {
                assert_eq!(ack.code(), cmd.code() + 1, "{cmd}");
                assert!(ack.is_ack(), "{ack}");
            }
        }
    }

    #[test]
    fn test_fire_and_forget_commands() {
        assert!(!Command::Watchdog.expects_ack());
        assert!(!Command::InitAck.expects_ack());
        assert!(!Command::ActualValues.expects_ack());
        assert!(!Command::PhaseResult.expects_ack());
        assert!(Command::StopChannelListMode.expects_ack());
    }

    #[test]
    fn test_motomed_range() {
        assert!(Command::SetGear.is_motomed());
        assert!(Command::MotomedError.is_motomed());
        assert!(!Command::StimulationError.is_motomed());
        assert!(!Command::Watchdog.is_motomed());
    }

    #[test]
    fn test_display_uses_protocol_name() {
        assert_eq!(Command::Watchdog.to_string(), "Watchdog");
        assert_eq!(
            Command::StartChannelListModeAck.to_string(),
            "StartChannelListModeAck"
        );
    }
}
