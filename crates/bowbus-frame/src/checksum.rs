//! CRC-8 as computed by the bus devices.
//!
//! A reflected CRC-8: polynomial `0x85`, register seeded with `0xE0`
//! (bit-reversed, so `0x07` in the LSB-first register), no final XOR.

use crc::{Algorithm, Crc};

/// The bus checksum parameters.
pub const CRC_8_BUS: Algorithm<u8> = Algorithm {
    width: 8,
    poly: 0x85,
    init: 0xE0,
    refin: true,
    refout: true,
    xorout: 0x00,
    check: 0x28,
    residue: 0x00,
};

pub const BUS_CRC: Crc<u8> = Crc::<u8>::new(&CRC_8_BUS);

/// Compute the bus checksum over `bytes`.
///
/// For a complete frame this is every byte except the trailing checksum,
/// start byte included.
pub fn crc8(bytes: &[u8]) -> u8 {
    BUS_CRC.checksum(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_seed() {
        assert_eq!(crc8(&[]), 0x07);
    }

    #[test]
    fn known_frames() {
        // wake-up request PC -> battery
        assert_eq!(crc8(&[0x10, 0x21, 0x40, 0x14]), 0x76);
        // pong PC -> battery
        assert_eq!(crc8(&[0x10, 0x23, 0x40]), 0x5A);
        // handoff to battery
        assert_eq!(crc8(&[0x10, 0x20]), 0x68);
        // ping battery -> PC
        assert_eq!(crc8(&[0x10, 0x44, 0x20]), 0x19);
        // GET DATA 04:10 from motor
        assert_eq!(crc8(&[0x10, 0x01, 0x42, 0x08, 0x04, 0x10]), 0xE2);
    }

    #[test]
    fn check_string() {
        assert_eq!(crc8(b"123456789"), 0x28);
        assert_eq!(crc8(b"123456789"), CRC_8_BUS.check);
    }

    #[test]
    fn digest_matches_one_shot() {
        let mut digest = BUS_CRC.digest();
        digest.update(&[0x10, 0x01, 0x42]);
        digest.update(&[0x08, 0x04, 0x10]);
        assert_eq!(digest.finalize(), 0xE2);
    }

    #[test]
    fn single_bit_flip_changes_checksum() {
        let frame = [0x10, 0x42, 0x05, 0x08, 0x00, 0x04, 0x10, 0x01, 0x2C];
        let mut flipped = frame;
        flipped[7] ^= 0x01;
        assert_eq!(crc8(&frame), 0x29);
        assert_ne!(crc8(&flipped), crc8(&frame));
    }
}
