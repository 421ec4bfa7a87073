//! ScienceMode 2 packet codec.
//!
//! ## Frame Format
//!
//! ```text
//! +-------+------+------------+------+-------------+-----+-----+---------+------+
//! | Start | Stuf | Checksum   | Stuf | Length      | Seq | Cmd | Data    | Stop |
//! +-------+------+------------+------+-------------+-----+-----+---------+------+
//! | 0xF0  | 0x81 | crc8 ^ 0x55| 0x81 | len ^ 0x55  | 1*  | 1*  | 0..n*   | 0x0F |
//! +-------+------+------------+------+-------------+-----+-----+---------+------+
//! ```
//!
//! Fields marked `*` are byte-stuffed: a byte equal to one of
//! [`STUFFED_BYTES`] is sent as `0x81, byte ^ 0x55`. Checksum and length are
//! always sent in stuffed form. Both cover the stuffed bytes from `Seq` to the
//! end of `Data`.

use crate::error::{Error, Result};
use crate::protocol::command::Command;
use crate::protocol::crc::crc8;
use byteorder::{BigEndian, ByteOrder};
use log::trace;

/// Start of packet marker.
pub const START_BYTE: u8 = 0xF0;

/// End of packet marker.
pub const STOP_BYTE: u8 = 0x0F;

/// Escape marker preceding a stuffed byte.
pub const STUFFING_BYTE: u8 = 0x81;

/// Key XOR-ed into stuffed bytes.
pub const STUFFING_KEY: u8 = 0x55;

/// Byte values that must never appear unescaped after the start marker.
pub const STUFFED_BYTES: [u8; 5] = [START_BYTE, STOP_BYTE, STUFFING_BYTE, STUFFING_KEY, 0x0A];

/// Largest packet the device accepts or emits.
pub const MAX_PACKET_BYTES: usize = 69;

/// Smallest well-formed packet: start, 4 header bytes, seq, cmd, stop.
pub const MIN_PACKET_BYTES: usize = 8;

/// Link speed of the Rehastim 2.
pub const BAUD_RATE: u32 = 460_800;

/// Protocol version the device announces in `Init`.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Whether `byte` has to be escaped on the wire.
pub fn needs_stuffing(byte: u8) -> bool {
    STUFFED_BYTES.contains(&byte)
}

/// Append `bytes` to `out`, escaping reserved values.
pub fn stuff_into(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        if needs_stuffing(byte) {
            out.push(STUFFING_BYTE);
            out.push(byte ^ STUFFING_KEY);
        } else {
            out.push(byte);
        }
    }
}

/// Escape reserved values in `bytes`.
pub fn stuff(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 2);
    stuff_into(&mut out, bytes);
    out
}

/// Reverse [`stuff`].
pub fn unstuff(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut cursor = PayloadCursor::new(bytes);
    let mut out = Vec::with_capacity(bytes.len());
    while !cursor.is_empty() {
        out.push(cursor.read_u8()?);
    }
    Ok(out)
}

/// Outbound command frame builder.
#[derive(Debug, Clone)]
pub struct CommandFrame {
    command: Command,
    payload: Vec<u8>,
}

impl CommandFrame {
    /// Create a frame without payload.
    pub fn new(command: Command) -> Self {
        Self {
            command,
            payload: Vec::new(),
        }
    }

    /// Create a frame carrying `payload` (unstuffed).
    pub fn with_payload(command: Command, payload: &[u8]) -> Self {
        Self {
            command,
            payload: payload.to_vec(),
        }
    }

    /// Heartbeat frame.
    pub fn watchdog() -> Self {
        Self::new(Command::Watchdog)
    }

    /// Host reply to the device `Init`. Result 0 means "version accepted".
    pub fn init_ack(result: i8) -> Self {
        Self::with_payload(Command::InitAck, &[result as u8])
    }

    /// Get the command.
    pub fn command(&self) -> Command {
        self.command
    }

    /// Get the unstuffed payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Build the complete wire frame with the given packet number.
    #[allow(clippy::cast_possible_truncation)]
    pub fn build(&self, sequence: u8) -> Vec<u8> {
        let mut body = Vec::with_capacity(2 + self.payload.len() * 2);
        stuff_into(&mut body, &[sequence, self.command.code()]);
        stuff_into(&mut body, &self.payload);

        // Body length is bounded by MAX_PACKET_BYTES for every real command.
        let checksum = crc8(&body);
        let length = body.len() as u8;

        let mut frame = Vec::with_capacity(body.len() + 6);
        frame.push(START_BYTE);
        frame.push(STUFFING_BYTE);
        frame.push(checksum ^ STUFFING_KEY);
        frame.push(STUFFING_BYTE);
        frame.push(length ^ STUFFING_KEY);
        frame.extend_from_slice(&body);
        frame.push(STOP_BYTE);
        frame
    }
}

/// Encode `command` with `payload` into a wire frame.
pub fn encode(sequence: u8, command: Command, payload: &[u8]) -> Vec<u8> {
    CommandFrame::with_payload(command, payload).build(sequence)
}

/// Sequential field reader over stuffed bytes.
///
/// Each read consumes one logical byte. When the byte under the cursor is
/// the stuffing marker the value is the following byte XOR the key, and the
/// cursor records one extra consumed byte so later fields land at the right
/// offset.
#[derive(Debug, Clone)]
pub struct PayloadCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    extra: usize,
}

impl<'a> PayloadCursor<'a> {
    /// Start reading at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            extra: 0,
        }
    }

    /// Raw offset of the next unread byte.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of stuffing markers skipped so far.
    pub fn extra_consumed(&self) -> usize {
        self.extra
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    /// Read one logical byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let byte = self.raw(self.pos)?;
        if byte == STUFFING_BYTE {
            let next = self.raw(self.pos + 1)?;
            self.pos += 2;
            self.extra += 1;
            Ok(next ^ STUFFING_KEY)
        } else {
            self.pos += 1;
            Ok(byte)
        }
    }

    /// Read one logical byte as a signed value.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a big-endian `u16` (high byte first).
    pub fn read_u16_be(&mut self) -> Result<u16> {
        let bytes = [self.read_u8()?, self.read_u8()?];
        Ok(BigEndian::read_u16(&bytes))
    }

    /// Read a big-endian `i16` (high byte first).
    pub fn read_i16_be(&mut self) -> Result<i16> {
        let bytes = [self.read_u8()?, self.read_u8()?];
        Ok(BigEndian::read_i16(&bytes))
    }

    fn raw(&self, index: usize) -> Result<u8> {
        self.bytes.get(index).copied().ok_or_else(|| {
            Error::Framing(format!(
                "field at offset {index} runs past the end of a {}-byte span",
                self.bytes.len()
            ))
        })
    }
}

/// A validated inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    sequence: u8,
    code: u8,
    data: Vec<u8>,
    payload: Vec<u8>,
}

impl Packet {
    /// Parse one framed span (`0xF0 ... 0x0F`).
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < MIN_PACKET_BYTES || raw.len() > MAX_PACKET_BYTES {
            return Err(Error::Framing(format!(
                "packet length {} outside {MIN_PACKET_BYTES}..={MAX_PACKET_BYTES}",
                raw.len()
            )));
        }
        if raw[0] != START_BYTE || raw[raw.len() - 1] != STOP_BYTE {
            return Err(Error::Framing("missing start or stop marker".into()));
        }

        let inner = &raw[1..raw.len() - 1];
        let mut header = PayloadCursor::new(inner);
        let checksum = header.read_u8()?;
        let length = header.read_u8()? as usize;
        let body = &inner[header.position()..];

        if body.len() != length {
            return Err(Error::Framing(format!(
                "length field says {length}, body has {}",
                body.len()
            )));
        }
        let actual = crc8(body);
        if actual != checksum {
            return Err(Error::Framing(format!(
                "checksum mismatch: expected {checksum:#04x}, got {actual:#04x}"
            )));
        }

        let mut cursor = PayloadCursor::new(body);
        let sequence = cursor.read_u8()?;
        let code = cursor.read_u8()?;
        let data = body[cursor.position()..].to_vec();
        let payload = unstuff(&data)?;

        Ok(Self {
            sequence,
            code,
            data,
            payload,
        })
    }

    /// Packet number.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Raw command identifier.
    pub fn code(&self) -> u8 {
        self.code
    }

    /// Command identifier, if known.
    pub fn command(&self) -> Option<Command> {
        Command::from_code(self.code)
    }

    /// Unstuffed payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// First payload byte as a signed status code.
    pub fn status(&self) -> Option<i8> {
        self.payload.first().map(|&b| b as i8)
    }

    /// Cursor over the still-stuffed data bytes.
    pub fn cursor(&self) -> PayloadCursor<'_> {
        PayloadCursor::new(&self.data)
    }
}

/// Re-frames an arbitrary byte stream into candidate packet spans.
///
/// Bytes before the first start marker are discarded. A trailing fragment
/// without a stop marker is kept until the next [`push`](Self::push).
#[derive(Debug, Default)]
pub struct PacketFramer {
    buffer: Vec<u8>,
}

impl PacketFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and collect every complete span.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(bytes);
        let mut spans = Vec::new();

        loop {
            match self.buffer.iter().position(|&b| b == START_BYTE) {
                Some(0) => {},
                Some(pos) => {
                    trace!("Discarding {pos} bytes before start marker");
                    self.buffer.drain(..pos);
                },
                None => {
                    if !self.buffer.is_empty() {
                        trace!("Discarding {} bytes without start marker", self.buffer.len());
                        self.buffer.clear();
                    }
                    break;
                },
            }

            // A stop marker earlier than the smallest possible packet is a
            // header byte that happens to share the value.
            let stop = self
                .buffer
                .iter()
                .enumerate()
                .skip(MIN_PACKET_BYTES - 1)
                .find(|&(_, &b)| b == STOP_BYTE)
                .map(|(i, _)| i);

            match stop {
                Some(end) if end < MAX_PACKET_BYTES => {
                    if let Some(restart) = self.restart_before(end) {
                        trace!("Dropping {restart}-byte truncated fragment");
                        self.buffer.drain(..restart);
                        continue;
                    }
                    spans.push(self.buffer.drain(..=end).collect());
                },
                Some(_) => {
                    trace!("No stop marker within {MAX_PACKET_BYTES} bytes, resyncing");
                    self.buffer.drain(..1);
                },
                None if self.buffer.len() > MAX_PACKET_BYTES => {
                    trace!("Oversized fragment, resyncing");
                    self.buffer.drain(..1);
                },
                None => break,
            }
        }

        spans
    }

    /// Offset of the last start marker inside the span ending at `end`.
    ///
    /// A raw start marker never occurs inside a packet, except as a stuffed
    /// header value right after the stuffing marker.
    fn restart_before(&self, end: usize) -> Option<usize> {
        (1..end)
            .rev()
            .find(|&i| self.buffer[i] == START_BYTE && self.buffer[i - 1] != STUFFING_BYTE)
    }

    /// Bytes retained for the next push.
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Drop any retained fragment.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_one(bytes: &[u8]) -> Packet {
        let mut framer = PacketFramer::new();
        let spans = framer.push(bytes);
        assert_eq!(spans.len(), 1);
        Packet::parse(&spans[0]).unwrap()
    }

    #[test]
    fn test_watchdog_frame_layout() {
        let data = CommandFrame::watchdog().build(0x02);
        assert_eq!(data.len(), 8);
        assert_eq!(data[0], START_BYTE);
        assert_eq!(data[1], STUFFING_BYTE);
        assert_eq!(data[2], crc8(&[0x02, 0x04]) ^ STUFFING_KEY);
        assert_eq!(data[3], STUFFING_BYTE);
        assert_eq!(data[4], 2 ^ STUFFING_KEY);
        assert_eq!(data[5], 0x02);
        assert_eq!(data[6], Command::Watchdog.code());
        assert_eq!(data[7], STOP_BYTE);
    }

    #[test]
    fn test_round_trip() {
        let payload = [0x00, 0x12, 0x7F, 0x80, 0xFE];
        let data = encode(7, Command::InitChannelListMode, &payload);
        let packet = frame_one(&data);
        assert_eq!(packet.sequence(), 7);
        assert_eq!(packet.command(), Some(Command::InitChannelListMode));
        assert_eq!(packet.payload(), &payload);
    }

    #[test]
    fn test_reserved_payload_bytes_take_two_bytes_on_the_wire() {
        for reserved in STUFFED_BYTES {
            let plain = encode(1, Command::SetGear, &[]);
            let stuffed = encode(1, Command::SetGear, &[reserved]);
            assert_eq!(stuffed.len(), plain.len() + 2, "{reserved:#04x}");

            let packet = frame_one(&stuffed);
            assert_eq!(packet.payload(), &[reserved]);
        }
    }

    #[test]
    fn test_stuffed_command_and_sequence() {
        // GetStimulationMode (0x0A) and sequence 0xF0 are both reserved values.
        let data = encode(0xF0, Command::GetStimulationMode, &[]);
        assert_eq!(&data[5..9], &[STUFFING_BYTE, 0xA5, STUFFING_BYTE, 0x5F]);
        let packet = frame_one(&data);
        assert_eq!(packet.sequence(), 0xF0);
        assert_eq!(packet.command(), Some(Command::GetStimulationMode));
    }

    #[test]
    fn test_early_stop_value_is_not_a_terminator() {
        // Find a packet whose stuffed checksum is 0x0F at offset 2.
        let data = (0u8..=255)
            .flat_map(|seq| (0u8..=255).map(move |value| (seq, value)))
            .map(|(seq, value)| encode(seq, Command::SetGearAck, &[value]))
            .find(|data| data[2] == STOP_BYTE)
            .unwrap();

        let mut framer = PacketFramer::new();
        let spans = framer.push(&data);
        assert_eq!(spans, vec![data.clone()]);
        assert!(Packet::parse(&spans[0]).is_ok());
    }

    #[test]
    fn test_stop_value_at_offset_three_keeps_packet_whole() {
        let mut raw = vec![START_BYTE, 0x81, 0x00, STOP_BYTE, 0x00, 0x01, 0x02, 0x03, 0x04];
        raw.push(STOP_BYTE);
        let mut framer = PacketFramer::new();
        let spans = framer.push(&raw);
        assert_eq!(spans, vec![raw]);
    }

    #[test]
    fn test_multiple_packets_with_garbage_prefix() {
        let mut stream = vec![0x00, 0x42];
        stream.extend(encode(1, Command::SetGearAck, &[0x00]));
        stream.extend(encode(2, Command::SetSpeedAck, &[0x00]));
        let mut framer = PacketFramer::new();
        let spans = framer.push(&stream);
        assert_eq!(spans.len(), 2);
        assert_eq!(
            Packet::parse(&spans[1]).unwrap().command(),
            Some(Command::SetSpeedAck)
        );
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_truncated_fragment_is_retained() {
        let data = encode(9, Command::StartChannelListModeAck, &[0x00]);
        let (head, tail) = data.split_at(6);

        let mut framer = PacketFramer::new();
        assert!(framer.push(head).is_empty());
        assert_eq!(framer.pending(), head);

        let spans = framer.push(tail);
        assert_eq!(spans, vec![data]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn test_packet_after_truncated_fragment_is_recovered() {
        let good = encode(3, Command::SetGearAck, &[0x00]);
        let mut stream = vec![START_BYTE, STUFFING_BYTE, 0x11];
        stream.extend(&good);

        let mut framer = PacketFramer::new();
        let spans = framer.push(&stream);
        assert_eq!(spans, vec![good]);
        assert_eq!(Packet::parse(&spans[0]).unwrap().sequence(), 3);
    }

    #[test]
    fn test_stuffed_start_value_in_header_is_not_a_restart() {
        // Checksum 0xA5 goes out as 0x81 0xF0.
        let data = (0u8..=255)
            .flat_map(|seq| (0u8..=255).map(move |value| (seq, value)))
            .map(|(seq, value)| encode(seq, Command::SetGearAck, &[value]))
            .find(|data| data[2] == START_BYTE)
            .unwrap();

        let mut framer = PacketFramer::new();
        let spans = framer.push(&data);
        assert_eq!(spans, vec![data.clone()]);
        assert!(Packet::parse(&spans[0]).is_ok());
    }

    #[test]
    fn test_oversized_fragment_resyncs() {
        let mut stream = vec![START_BYTE];
        stream.extend(std::iter::repeat_n(0x11, MAX_PACKET_BYTES + 4));
        stream.extend(encode(4, Command::SetGearAck, &[0x00]));
        let mut framer = PacketFramer::new();
        let spans = framer.push(&stream);
        assert_eq!(spans.len(), 1);
        assert!(Packet::parse(&spans[0]).is_ok());
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        let mut data = encode(1, Command::SetGearAck, &[0x00]);
        data[2] ^= 0x01;
        assert!(matches!(Packet::parse(&data), Err(Error::Framing(_))));
    }

    #[test]
    fn test_parse_rejects_bad_length() {
        let mut data = encode(1, Command::SetGearAck, &[0x00, 0x01]);
        data[4] = 5 ^ STUFFING_KEY;
        assert!(matches!(Packet::parse(&data), Err(Error::Framing(_))));
    }

    #[test]
    fn test_cursor_tracks_extra_bytes() {
        let bytes = [0x01, STUFFING_BYTE, 0x0F ^ STUFFING_KEY, 0x00, 0x78];
        let mut cursor = PayloadCursor::new(&bytes);
        assert_eq!(cursor.read_u8().unwrap(), 0x01);
        assert_eq!(cursor.read_u8().unwrap(), 0x0F);
        assert_eq!(cursor.extra_consumed(), 1);
        assert_eq!(cursor.read_u16_be().unwrap(), 0x0078);
        assert!(cursor.is_empty());
        assert!(cursor.read_u8().is_err());
    }

    #[test]
    fn test_cursor_dangling_marker_is_framing_error() {
        let mut cursor = PayloadCursor::new(&[STUFFING_BYTE]);
        assert!(matches!(cursor.read_u8(), Err(Error::Framing(_))));
    }

    #[test]
    fn test_status_is_signed() {
        let data = encode(1, Command::StimulationError, &[0xFE]);
        let packet = frame_one(&data);
        assert_eq!(packet.status(), Some(-2));
    }
}
