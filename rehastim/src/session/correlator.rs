//! Command/acknowledgement correlation.
//!
//! The device answers command `n` with code `n + 1`. Pending commands are
//! kept per expected ack code in send order, so acks of different kinds may
//! arrive in any order and still pair with the right request.

use std::collections::{HashMap, VecDeque};

use log::{debug, trace};

use crate::protocol::{Command, Packet};
use crate::telemetry::RingBuffer;

/// Unsolicited acknowledgements kept for inspection.
pub const MAX_UNMATCHED: usize = 16;

/// Handle returned for a tracked command.
pub type Ticket = u64;

/// A decoded reply from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Acknowledgement {
    /// Reply command.
    pub command: Command,
    /// Packet number the device used.
    pub sequence: u8,
    /// Unstuffed payload.
    pub payload: Vec<u8>,
}

impl Acknowledgement {
    /// Build from a parsed packet. `None` for unknown command codes.
    pub fn from_packet(packet: &Packet) -> Option<Self> {
        Some(Self {
            command: packet.command()?,
            sequence: packet.sequence(),
            payload: packet
                .payload()
                .to_vec(),
        })
    }

    /// First payload byte as a signed status code.
    pub fn status(&self) -> Option<i8> {
        self.payload
            .first()
            .map(|&b| b as i8)
    }
}

/// Pairs sent commands with their acknowledgements.
#[derive(Debug)]
pub struct AckCorrelator {
    next_ticket: Ticket,
    pending: HashMap<Command, VecDeque<(Ticket, Command)>>,
    resolved: HashMap<Ticket, Acknowledgement>,
    latest: HashMap<Command, Acknowledgement>,
    unmatched: RingBuffer<Acknowledgement>,
}

impl Default for AckCorrelator {
    fn default() -> Self {
        Self {
            next_ticket: 0,
            pending: HashMap::new(),
            resolved: HashMap::new(),
            latest: HashMap::new(),
            unmatched: RingBuffer::new(MAX_UNMATCHED),
        }
    }
}

impl AckCorrelator {
    /// Create an empty correlator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `command`. Commands without an acknowledgement are not tracked.
    pub fn register(&mut self, command: Command) -> Option<Ticket> {
        let ack = command.ack()?;
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending
            .entry(ack)
            .or_default()
            .push_back((ticket, command));
        trace!("Tracking {command} as #{ticket}, expecting {ack}");
        Some(ticket)
    }

    /// Record an acknowledgement and pair it with the oldest matching command.
    ///
    /// Returns the ticket that was resolved, if any.
    pub fn on_ack(&mut self, ack: Acknowledgement) -> Option<Ticket> {
        self.latest
            .insert(ack.command, ack.clone());

        let matched = self
            .pending
            .get_mut(&ack.command)
            .and_then(VecDeque::pop_front);
        if self
            .pending
            .get(&ack.command)
            .is_some_and(VecDeque::is_empty)
        {
            self.pending
                .remove(&ack.command);
        }

        match matched {
            Some((ticket, command)) => {
                debug!("{command} acknowledged by {} (#{ticket})", ack.command);
                self.resolved
                    .insert(ticket, ack);
                Some(ticket)
            },
            None => {
                debug!("Unsolicited {}", ack.command);
                self.unmatched
                    .push(ack);
                None
            },
        }
    }

    /// Take the acknowledgement of a resolved ticket.
    pub fn take(&mut self, ticket: Ticket) -> Option<Acknowledgement> {
        self.resolved
            .remove(&ticket)
    }

    /// Whether `ticket` has been answered.
    pub fn is_resolved(&self, ticket: Ticket) -> bool {
        self.resolved
            .contains_key(&ticket)
    }

    /// Forget a ticket whose caller stopped waiting.
    pub fn cancel(&mut self, ticket: Ticket) {
        self.resolved
            .remove(&ticket);
        self.pending
            .retain(|_, queue| {
                queue.retain(|&(t, _)| t != ticket);
                !queue.is_empty()
            });
    }

    /// Most recent acknowledgement of a given kind.
    pub fn latest(&self, ack: Command) -> Option<&Acknowledgement> {
        self.latest
            .get(&ack)
    }

    /// Number of commands still waiting for an acknowledgement.
    pub fn pending_len(&self) -> usize {
        self.pending
            .values()
            .map(VecDeque::len)
            .sum()
    }

    /// The most recent acknowledgements that matched no tracked command.
    pub fn unmatched(&self) -> &RingBuffer<Acknowledgement> {
        &self.unmatched
    }

    /// Drain the unmatched acknowledgements, oldest first.
    pub fn take_unmatched(&mut self) -> Vec<Acknowledgement> {
        self.unmatched
            .drain()
            .collect()
    }

    /// Drop all state.
    pub fn clear(&mut self) {
        self.pending
            .clear();
        self.resolved
            .clear();
        self.latest
            .clear();
        self.unmatched
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ack(command: Command, status: i8) -> Acknowledgement {
        Acknowledgement {
            command,
            sequence: 0,
            payload: vec![status as u8],
        }
    }

    #[test]
    fn test_reordered_acks_all_match() {
        let mut correlator = AckCorrelator::new();
        let a = correlator.register(Command::InitPhaseTraining).unwrap();
        let b = correlator.register(Command::StartPhase).unwrap();
        let c = correlator.register(Command::SetGear).unwrap();
        assert_eq!(correlator.pending_len(), 3);

        assert_eq!(correlator.on_ack(ack(Command::StartPhaseAck, 0)), Some(b));
        assert_eq!(correlator.on_ack(ack(Command::InitPhaseTrainingAck, 0)), Some(a));
        assert_eq!(correlator.on_ack(ack(Command::SetGearAck, 0)), Some(c));

        assert_eq!(correlator.pending_len(), 0);
        assert!(correlator.unmatched().is_empty());
        assert_eq!(correlator.take(b).unwrap().command, Command::StartPhaseAck);
        assert!(correlator.take(b).is_none());
    }

    #[test]
    fn test_same_kind_matches_in_send_order() {
        let mut correlator = AckCorrelator::new();
        let first = correlator.register(Command::SetSpeed).unwrap();
        let second = correlator.register(Command::SetSpeed).unwrap();
        assert_eq!(correlator.on_ack(ack(Command::SetSpeedAck, 0)), Some(first));
        assert_eq!(correlator.on_ack(ack(Command::SetSpeedAck, -1)), Some(second));
        assert_eq!(correlator.take(second).unwrap().status(), Some(-1));
    }

    #[test]
    fn test_unsolicited_ack() {
        let mut correlator = AckCorrelator::new();
        assert_eq!(correlator.on_ack(ack(Command::SetGearAck, 0)), None);
        assert_eq!(correlator.unmatched().len(), 1);
        assert!(correlator.latest(Command::SetGearAck).is_some());
        assert_eq!(correlator.take_unmatched().len(), 1);
        assert!(correlator.unmatched().is_empty());
    }

    #[test]
    fn test_unsolicited_acks_are_bounded() {
        let mut correlator = AckCorrelator::new();
        for sequence in 0..2000u16 {
            let mut reply = ack(Command::SetGearAck, 0);
            reply.sequence = (sequence % 256) as u8;
            correlator.on_ack(reply);
        }
        assert_eq!(correlator.unmatched().len(), MAX_UNMATCHED);
        assert_eq!(
            correlator.unmatched().latest().unwrap().sequence,
            (1999 % 256) as u8
        );
        assert_eq!(correlator.latest(Command::SetGearAck).unwrap().sequence, (1999 % 256) as u8);
    }

    #[test]
    fn test_untracked_commands() {
        let mut correlator = AckCorrelator::new();
        assert!(correlator.register(Command::Watchdog).is_none());
        assert!(correlator.register(Command::InitAck).is_none());
        assert_eq!(correlator.pending_len(), 0);
    }

    #[test]
    fn test_cancel() {
        let mut correlator = AckCorrelator::new();
        let ticket = correlator.register(Command::SetGear).unwrap();
        correlator.cancel(ticket);
        assert_eq!(correlator.pending_len(), 0);
        assert_eq!(correlator.on_ack(ack(Command::SetGearAck, 0)), None);
        assert!(!correlator.is_resolved(ticket));
    }
}
