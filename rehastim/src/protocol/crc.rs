//! CRC-8 checksum used in the ScienceMode 2 packet header.

/// CRC-8 polynomial (x^8 + x^2 + x + 1).
const POLY: u8 = 0x07;

/// Compute CRC-8 (poly 0x07, init 0x00, no reflection, no final XOR).
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        // Standard check input for CRC-8/SMBUS.
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn test_crc8_empty() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn test_crc8_single_byte() {
        assert_eq!(crc8(&[0x01]), 0x07);
    }
}
