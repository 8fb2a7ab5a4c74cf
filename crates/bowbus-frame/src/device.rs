//! Known bus device ids.
//!
//! Ids are 4 bits wide. The target id sits in the high nibble of the first
//! header byte, the source id in the high nibble of the second.

/// Motor controller.
pub const MOTOR: u8 = 0x00;

/// Battery.
pub const BATTERY: u8 = 0x02;

/// Host PC (this side of the bus).
pub const PC: u8 = 0x04;

/// Handlebar display.
pub const DISPLAY: u8 = 0x0C;

/// Largest id a header nibble can carry.
pub const MAX_DEVICE_ID: u8 = 0x0F;

/// Returns a human-readable name for a device id.
pub fn device_name(id: u8) -> &'static str {
    match id {
        MOTOR => "MOTOR",
        BATTERY => "BATTERY",
        PC => "PC",
        DISPLAY => "DISPLAY",
        _ => "UNKNOWN",
    }
}

/// Returns true if the id fits in a header nibble.
pub fn is_valid(id: u8) -> bool {
    id <= MAX_DEVICE_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_devices_are_named() {
        assert_eq!(device_name(MOTOR), "MOTOR");
        assert_eq!(device_name(BATTERY), "BATTERY");
        assert_eq!(device_name(PC), "PC");
        assert_eq!(device_name(DISPLAY), "DISPLAY");
        assert_eq!(device_name(0x07), "UNKNOWN");
    }

    #[test]
    fn validity_is_nibble_range() {
        assert!(is_valid(DISPLAY));
        assert!(is_valid(MAX_DEVICE_ID));
        assert!(!is_valid(0x10));
    }
}
