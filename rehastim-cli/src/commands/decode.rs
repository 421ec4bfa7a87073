//! Offline packet decoding.
//!
//! Re-frames a captured byte stream exactly like the session reader does and
//! prints every packet it finds.

use anyhow::{Result, bail};
use console::style;
use rehastim::protocol::status::{self, handshake_ack};
use rehastim::{ActualValuesSample, Command, Packet, PacketFramer, PhaseResult};
use serde_json::{Value, json};

/// Parse a hex dump. Whitespace, `,` separators and `0x` prefixes are ignored.
pub(crate) fn parse_hex(input: &str) -> Result<Vec<u8>> {
    let digits: String = input
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|token| {
            token
                .trim_start_matches("0x")
                .trim_start_matches("0X")
        })
        .collect();

    if !digits.is_ascii() {
        bail!("input contains non-hex characters");
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| anyhow::anyhow!("invalid hex byte '{}': {e}", &digits[i..i + 2]))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Structured view of one packet.
pub(crate) fn describe(packet: &Packet) -> Value {
    let mut value = json!({
        "sequence": packet.sequence(),
        "code": packet.code(),
        "command": packet.command().map_or("Unknown", Command::name),
        "payload": hex(packet.payload()),
    });

    let detail = match packet.command() {
        Some(Command::ActualValues) => {
            ActualValuesSample::decode(packet).map_or(Value::Null, |s| json!(s))
        },
        Some(Command::PhaseResult) => PhaseResult::decode(packet).map_or(Value::Null, |r| json!(r)),
        Some(Command::StimulationError) => {
            let class = status::stimulation_error(packet.status().unwrap_or(0));
            json!({ "message": class.message, "fatal": class.is_fatal() })
        },
        Some(Command::MotomedError) => {
            let class = status::motomed_error(packet.status().unwrap_or(0));
            json!({ "message": class.message, "severity": format!("{:?}", class.severity) })
        },
        Some(Command::GetStimulationModeAck) => {
            json!({ "message": status::get_mode_ack(packet.payload()) })
        },
        Some(command) => handshake_ack(command, packet.payload()).map_or(Value::Null, |check| {
            json!({ "message": check.message, "success": check.is_success() })
        }),
        None => Value::Null,
    };
    if !detail.is_null() {
        value["detail"] = detail;
    }
    value
}

/// Decode command implementation.
pub(crate) fn cmd_decode(input: &str, json_output: bool) -> Result<()> {
    let bytes = parse_hex(input)?;
    let mut framer = PacketFramer::new();
    let spans = framer.push(&bytes);

    let mut packets = Vec::new();
    for raw in &spans {
        match Packet::parse(raw) {
            Ok(packet) => packets.push(describe(&packet)),
            Err(e) => {
                if !json_output {
                    eprintln!("{} {} ({})", style("✗").red(), hex(raw), e);
                }
            },
        }
    }

    if packets.is_empty() {
        bail!("no valid packet in {} bytes", bytes.len());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&packets)?);
        return Ok(());
    }

    for packet in &packets {
        println!(
            "{} #{} {} [{}]",
            style("•").dim(),
            packet["sequence"],
            style(packet["command"].as_str().unwrap_or("Unknown")).cyan().bold(),
            packet["payload"].as_str().unwrap_or_default()
        );
        if let Some(detail) = packet.get("detail") {
            println!("    {detail}");
        }
    }
    if !framer.pending().is_empty() {
        eprintln!(
            "{} {} trailing bytes without stop marker",
            style("ℹ").blue(),
            framer.pending().len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehastim::encode;

    #[test]
    fn test_parse_hex_formats() {
        assert_eq!(parse_hex("F0 0f").unwrap(), vec![0xF0, 0x0F]);
        assert_eq!(parse_hex("0xF0,0x0F").unwrap(), vec![0xF0, 0x0F]);
        assert_eq!(parse_hex("f00f").unwrap(), vec![0xF0, 0x0F]);
        assert!(parse_hex("F").is_err());
        assert!(parse_hex("ZZ").is_err());
    }

    #[test]
    fn test_parse_hex_rejects_non_ascii() {
        assert!(parse_hex("aéb").is_err());
        assert!(parse_hex("F0 é0").is_err());
    }

    #[test]
    fn test_describe_get_mode() {
        let raw = encode(0, Command::GetStimulationModeAck, &[0, 1]);
        let value = describe(&Packet::parse(&raw).unwrap());
        assert_eq!(value["detail"]["message"], "Stimulation initialized");
    }

    #[test]
    fn test_describe_actual_values() {
        let raw = encode(3, Command::ActualValues, &[0, 20, 0, 30, 0xFF, 0xFE]);
        let packet = Packet::parse(&raw).unwrap();
        let value = describe(&packet);
        assert_eq!(value["command"], "ActualValues");
        assert_eq!(value["detail"]["speed"], 30);
        assert_eq!(value["detail"]["torque"], -2);
    }

    #[test]
    fn test_describe_handshake() {
        let raw = encode(0, Command::StartChannelListModeAck, &[(-8i8) as u8]);
        let value = describe(&Packet::parse(&raw).unwrap());
        assert_eq!(value["detail"]["message"], "Busy error");
        assert_eq!(value["detail"]["success"], false);
    }
}
