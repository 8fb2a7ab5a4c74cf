//! The procedures a session can run.
//!
//! Each one is a small state machine of its own: it decides what to send
//! next and which incoming message answers it.

mod clear_error;
mod pair_battery;
mod pair_display;
mod scan;

pub use clear_error::ClearError;
pub use pair_battery::BatteryPairing;
pub use pair_display::DisplayPairing;
pub use scan::{Scan, ScanResult, PRIORITY_TYPES};

use bowbus_frame::command::status;
use bowbus_frame::Message;

/// A response addressed to `host`, sent by `from`, carrying `command`.
pub(crate) fn is_reply(message: &Message, host: u8, from: u8, command: u8) -> bool {
    message.target() == host
        && message.is_response()
        && message.source() == Some(from)
        && message.is_command(command)
}

/// Status byte of a GET DATA or PUT DATA response; a missing byte counts as
/// not found.
pub(crate) fn status_of(message: &Message) -> u8 {
    message
        .payload()
        .first()
        .copied()
        .unwrap_or(status::NOT_FOUND)
}

/// Display name of a GET DATA or PUT DATA status byte.
pub fn status_name(code: u8) -> String {
    match code {
        status::OK => "OK".to_string(),
        status::NOT_FOUND => "NOT FOUND".to_string(),
        status::TYPE_MISMATCH => "TYPE MISMATCH".to_string(),
        other => format!("STATUS {other:02x}"),
    }
}
