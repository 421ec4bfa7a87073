//! MOTOmed training commands.
//!
//! The trainer is reached through the stimulator link. [`Motomed`] wraps a
//! [`Session`] opened with `with_motomed` and turns each training action
//! into the matching command and payload.

use std::time::Duration;

use log::warn;

use crate::error::{Error, Result};
use crate::protocol::status::{self, Severity};
use crate::protocol::Command;
use crate::session::{Acknowledgement, Session};
use crate::telemetry::{ActualValuesSample, PhaseResult};

/// Highest gear the trainer accepts.
pub const MAX_GEAR: u8 = 20;

/// Highest speed in rpm the trainer accepts.
pub const MAX_SPEED: u8 = 60;

/// Body part being trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyPart {
    /// Leg trainer.
    #[default]
    Legs,
    /// Arm trainer.
    Arms,
}

impl BodyPart {
    fn byte(self) -> u8 {
        match self {
            Self::Legs => 0,
            Self::Arms => 1,
        }
    }
}

/// Settings for one training phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSettings {
    /// Motor speed in rpm.
    pub speed: u8,
    /// Resistance gear.
    pub gear: u8,
    /// Active (patient drives) or passive (motor drives) training.
    pub active: bool,
    /// Crank direction.
    pub go_forward: bool,
    /// Stop the motor when a spasm is detected.
    pub spasm_detection: bool,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self {
            speed: 30,
            gear: 5,
            active: false,
            go_forward: true,
            spasm_detection: true,
        }
    }
}

impl PhaseSettings {
    fn payload(&self) -> Result<[u8; 5]> {
        check_speed(self.speed)?;
        check_gear(self.gear)?;
        Ok([
            u8::from(self.active),
            u8::from(!self.go_forward),
            self.speed,
            self.gear,
            u8::from(self.spasm_detection),
        ])
    }
}

fn check_speed(speed: u8) -> Result<()> {
    if speed > MAX_SPEED {
        return Err(Error::Config(format!("speed {speed} exceeds {MAX_SPEED} rpm")));
    }
    Ok(())
}

fn check_gear(gear: u8) -> Result<()> {
    if gear == 0 || gear > MAX_GEAR {
        return Err(Error::Config(format!("gear {gear} outside 1..={MAX_GEAR}")));
    }
    Ok(())
}

/// MOTOmed facade over a session.
pub struct Motomed<'a> {
    session: &'a Session,
}

impl<'a> Motomed<'a> {
    /// Wrap `session`. Fails when the session was opened without a MOTOmed.
    pub fn new(session: &'a Session) -> Result<Self> {
        if !session
            .config()
            .with_motomed
        {
            return Err(Error::Config(
                "session was opened without a MOTOmed (set with_motomed)".into(),
            ));
        }
        Ok(Self { session })
    }

    /// Underlying session.
    pub fn session(&self) -> &Session {
        self.session
    }

    fn command(&self, command: Command, payload: &[u8]) -> Result<Acknowledgement> {
        let ack = self
            .session
            .issue(command, payload)?;
        let class = status::motomed_error(ack.status().unwrap_or(0));
        match class.severity {
            Severity::Ok => Ok(ack),
            Severity::Advisory => {
                warn!("{command}: {}", class.message);
                Ok(ack)
            },
            Severity::Error | Severity::Fatal => Err(Error::Protocol(format!(
                "{command} failed with {}: {}",
                class.code, class.message
            ))),
        }
    }

    /// Prepare a phase training session.
    pub fn init_phase_training(&self, body_part: BodyPart) -> Result<Acknowledgement> {
        self.command(Command::InitPhaseTraining, &[body_part.byte()])
    }

    /// Start the next training phase.
    pub fn start_phase(&self, settings: &PhaseSettings) -> Result<Acknowledgement> {
        self.command(Command::StartPhase, &settings.payload()?)
    }

    /// Pause the current phase.
    pub fn pause_phase(&self) -> Result<Acknowledgement> {
        self.command(Command::PausePhase, &[])
    }

    /// End phase training. The trainer answers with a phase result.
    pub fn stop_training(&self) -> Result<Acknowledgement> {
        self.command(Command::StopPhaseTraining, &[])
    }

    /// Change the crank direction.
    pub fn set_rotation_direction(&self, go_forward: bool) -> Result<Acknowledgement> {
        self.command(Command::SetRotationDirection, &[u8::from(!go_forward)])
    }

    /// Change the motor speed.
    pub fn set_speed(&self, speed: u8) -> Result<Acknowledgement> {
        check_speed(speed)?;
        self.command(Command::SetSpeed, &[speed])
    }

    /// Change the resistance gear.
    pub fn set_gear(&self, gear: u8) -> Result<Acknowledgement> {
        check_gear(gear)?;
        self.command(Command::SetGear, &[gear])
    }

    /// Lock or unlock the trainer keypad.
    pub fn set_keyboard_lock(&self, locked: bool) -> Result<Acknowledgement> {
        self.command(Command::SetKeyboardLock, &[u8::from(locked)])
    }

    /// Start basic (unphased) training.
    pub fn start_basic_training(&self, body_part: BodyPart) -> Result<Acknowledgement> {
        self.command(Command::StartBasicTraining, &[body_part.byte()])
    }

    /// Pause basic training.
    pub fn pause_basic_training(&self) -> Result<Acknowledgement> {
        self.command(Command::PauseBasicTraining, &[])
    }

    /// Resume basic training.
    pub fn continue_basic_training(&self) -> Result<Acknowledgement> {
        self.command(Command::ContinueBasicTraining, &[])
    }

    /// Stop basic training.
    pub fn stop_basic_training(&self) -> Result<Acknowledgement> {
        self.command(Command::StopBasicTraining, &[])
    }

    /// Wait until the trainer reports the last command done.
    pub fn wait_command_done(&self, timeout: Option<Duration>) -> Result<()> {
        self.session
            .wait_motomed_done(timeout)
    }

    /// Wait for the result of the phase that is running.
    pub fn get_phase_result(&self) -> Result<PhaseResult> {
        self.session
            .get_latest_phase_result()
    }

    /// Latest telemetry sample, waiting for the first one.
    pub fn latest_sample(&self) -> Result<ActualValuesSample> {
        self.session
            .get_latest_sample()
    }

    /// Latest crank angle.
    pub fn angle(&self) -> Option<i16> {
        self.session
            .try_latest_sample()
            .map(|s| s.angle)
    }

    /// Latest speed.
    pub fn speed(&self) -> Option<i16> {
        self.session
            .try_latest_sample()
            .map(|s| s.speed)
    }

    /// Latest torque.
    pub fn torque(&self) -> Option<i16> {
        self.session
            .try_latest_sample()
            .map(|s| s.torque)
    }
}
