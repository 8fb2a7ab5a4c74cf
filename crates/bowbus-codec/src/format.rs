//! Value formatters.

use std::fmt::Write;

/// Lowercase hex, two digits per byte, no separators.
pub fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

fn fold_be(bytes: &[u8]) -> u128 {
    bytes
        .iter()
        .fold(0u128, |acc, &byte| (acc << 8) | u128::from(byte))
}

/// Big-endian unsigned integer.
pub fn as_uint(bytes: &[u8]) -> String {
    fold_be(bytes).to_string()
}

/// Big-endian two's complement integer.
pub fn as_int(bytes: &[u8]) -> String {
    let raw = fold_be(bytes);
    let bits = bytes.len() * 8;
    let negative = bytes.first().is_some_and(|&first| first & 0x80 != 0);
    let value = if negative && bits < 128 {
        raw as i128 - (1i128 << bits)
    } else {
        raw as i128
    };
    value.to_string()
}

/// Big-endian IEEE-754 single; anything but 4 bytes falls back to hex.
pub fn as_float32(bytes: &[u8]) -> String {
    match <[u8; 4]>::try_from(bytes) {
        Ok(raw) => format!("{:?}", f32::from_be_bytes(raw)),
        Err(_) => hex(bytes),
    }
}

/// Quoted text; invalid UTF-8 is replaced, not rejected.
pub fn as_text(bytes: &[u8]) -> String {
    format!("'{}'", String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_lowercase_and_padded() {
        assert_eq!(hex(&[0x00, 0x0A, 0xFF]), "000aff");
        assert_eq!(hex(&[]), "");
    }

    #[test]
    fn unsigned() {
        assert_eq!(as_uint(&[0x01, 0x2C]), "300");
        assert_eq!(as_uint(&[0xFF, 0xFF, 0xFF, 0xFF]), "4294967295");
        assert_eq!(as_uint(&[]), "0");
    }

    #[test]
    fn signed() {
        assert_eq!(as_int(&[0xFF, 0xFE]), "-2");
        assert_eq!(as_int(&[0x7F, 0xFF]), "32767");
        assert_eq!(as_int(&[0x80]), "-128");
        assert_eq!(as_int(&[0x00, 0x80]), "128");
    }

    #[test]
    fn float() {
        assert_eq!(as_float32(&[0x3F, 0xC0, 0x00, 0x00]), "1.5");
        assert_eq!(as_float32(&[0x43, 0x96, 0x00, 0x00]), "300.0");
        assert_eq!(as_float32(&[0x3F, 0xC0]), "3fc0");
    }

    #[test]
    fn text() {
        assert_eq!(as_text(b"BOW"), "'BOW'");
    }
}
