//! Command codes carried in the fourth byte of request and response frames.

/// Read one or more typed fields from a device.
pub const GET_DATA: u8 = 0x08;

/// Write one or more typed fields to a device.
pub const PUT_DATA: u8 = 0x09;

/// Wake a device; the battery answers once it is ready for traffic.
pub const WAKE_UP: u8 = 0x14;

/// Error code broadcast.
pub const ERROR_CODE: u8 = 0x17;

/// Device serial number.
pub const SERIAL: u8 = 0x20;

pub const BUTTON_CHECK: u8 = 0x22;

/// Display update (segment blink states, speed, distance).
pub const DISPLAY_UPDATE: u8 = 0x26;

/// Alternate display update, same layout as [`DISPLAY_UPDATE`].
pub const DISPLAY_UPDATE_ALT: u8 = 0x27;

/// Display state (screen, assist level, lights, trip counters).
pub const DISPLAY_STATE: u8 = 0x28;

/// Assist mode change.
pub const MODE_CHANGE: u8 = 0x34;

/// GET DATA / PUT DATA response status codes.
pub mod status {
    pub const OK: u8 = 0x00;
    pub const NOT_FOUND: u8 = 0x01;
    pub const TYPE_MISMATCH: u8 = 0x02;
}
