use std::fmt;

use crate::format::{as_float32, as_int, as_text, as_uint, hex};

/// Numeric or text interpretation selected by descriptor bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Unsigned,
    Signed,
    Float,
    Text,
}

/// How the bytes of one value (or one array element) are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Formatter {
    /// Big-endian unsigned integer.
    Unsigned,
    /// Big-endian two's complement integer.
    Signed,
    /// IEEE-754 single precision, big-endian.
    Float32,
    /// Quoted text.
    Text,
    /// Lowercase hex digits.
    Hex,
}

impl Formatter {
    pub fn render(self, bytes: &[u8]) -> String {
        match self {
            Self::Unsigned => as_uint(bytes),
            Self::Signed => as_int(bytes),
            Self::Float32 => as_float32(bytes),
            Self::Text => as_text(bytes),
            Self::Hex => hex(bytes),
        }
    }
}

/// Field descriptor byte of GET DATA / PUT DATA.
///
/// ```text
///   7      6      5  4    3  2  1    0
/// ┌──────┬───────┬──────┬─────────┬───┐
/// │ more │ array │ kind │ size    │ - │
/// └──────┴───────┴──────┴─────────┴───┘
/// ```
///
/// The size code layout (bits 1-3) is how captures have been read so far;
/// it has not been confirmed against every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeFlags(u8);

impl TypeFlags {
    /// Another field descriptor follows this field.
    pub const MORE: u8 = 0x80;
    /// The field is an array of elements.
    pub const ARRAY: u8 = 0x40;

    pub fn new(descriptor: u8) -> Self {
        Self(descriptor)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn more(self) -> bool {
        self.0 & Self::MORE != 0
    }

    pub fn array(self) -> bool {
        self.0 & Self::ARRAY != 0
    }

    /// Raw 3-bit size code; 0 means single bytes.
    pub fn size_code(self) -> u8 {
        (self.0 & 0b1110) >> 1
    }

    pub fn kind(self) -> ValueKind {
        match (self.0 >> 4) & 0b11 {
            0b00 => ValueKind::Unsigned,
            0b01 => ValueKind::Signed,
            0b10 => ValueKind::Float,
            _ => ValueKind::Text,
        }
    }

    /// Bytes per element.
    pub fn element_size(self) -> usize {
        match self.size_code() {
            0 => 1,
            code => usize::from(code),
        }
    }

    /// The descriptor without the `more` bit, which is framing, not type.
    pub fn type_value(self) -> u8 {
        self.0 & !Self::MORE
    }

    pub fn formatter(self) -> Formatter {
        let size = self.size_code();
        match self.kind() {
            ValueKind::Unsigned if size > 0 => Formatter::Unsigned,
            ValueKind::Signed if size > 0 => Formatter::Signed,
            ValueKind::Float if size == 4 => Formatter::Float32,
            ValueKind::Text if size == 0 => Formatter::Text,
            _ => Formatter::Hex,
        }
    }
}

impl From<u8> for TypeFlags {
    fn from(descriptor: u8) -> Self {
        Self(descriptor)
    }
}

impl fmt::Display for TypeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.type_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_fields() {
        let flags = TypeFlags::new(0xC4);
        assert!(flags.more());
        assert!(flags.array());
        assert_eq!(flags.size_code(), 2);
        assert_eq!(flags.element_size(), 2);
        assert_eq!(flags.kind(), ValueKind::Unsigned);
        assert_eq!(flags.type_value(), 0x44);
        assert_eq!(flags.to_string(), "44");
    }

    #[test]
    fn size_code_zero_is_one_byte() {
        let flags = TypeFlags::new(0x40);
        assert_eq!(flags.size_code(), 0);
        assert_eq!(flags.element_size(), 1);
    }

    #[test]
    fn kinds() {
        assert_eq!(TypeFlags::new(0x00).kind(), ValueKind::Unsigned);
        assert_eq!(TypeFlags::new(0x10).kind(), ValueKind::Signed);
        assert_eq!(TypeFlags::new(0x20).kind(), ValueKind::Float);
        assert_eq!(TypeFlags::new(0x30).kind(), ValueKind::Text);
    }

    #[test]
    fn formatter_selection() {
        // (descriptor, expected) over kind x array/scalar x size codes {0, 2, 4}
        let cases = [
            (0x00, Formatter::Hex),
            (0x04, Formatter::Unsigned),
            (0x08, Formatter::Unsigned),
            (0x40, Formatter::Hex),
            (0x44, Formatter::Unsigned),
            (0x10, Formatter::Hex),
            (0x14, Formatter::Signed),
            (0x58, Formatter::Signed),
            (0x20, Formatter::Hex),
            (0x24, Formatter::Hex),
            (0x28, Formatter::Float32),
            (0x68, Formatter::Float32),
            (0x30, Formatter::Text),
            (0x70, Formatter::Text),
            (0x34, Formatter::Hex),
            (0x78, Formatter::Hex),
        ];
        for (descriptor, expected) in cases {
            assert_eq!(
                TypeFlags::new(descriptor).formatter(),
                expected,
                "descriptor {descriptor:02x}"
            );
        }
    }

    #[test]
    fn largest_size_code() {
        // bits 1-3 all set: size code 7, the widest element a descriptor can name
        let flags = TypeFlags::new(0x0E);
        assert_eq!(flags.size_code(), 7);
        assert_eq!(flags.element_size(), 7);
        assert_eq!(flags.formatter(), Formatter::Unsigned);
    }

    #[test]
    fn more_bit_does_not_change_type() {
        let plain = TypeFlags::new(0x28);
        let chained = TypeFlags::new(0xA8);
        assert_eq!(plain.type_value(), chained.type_value());
        assert_eq!(plain.formatter(), chained.formatter());
        assert!(!plain.more());
        assert!(chained.more());
    }
}
