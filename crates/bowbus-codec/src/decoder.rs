//! Message validation and human-readable rendering.
//!
//! [`Decoder::check`] flags frames whose size or checksum is off;
//! [`Decoder::decode`] renders a message as one line of text. A flagged
//! message can still be decoded, its content is just untrustworthy.

use std::fmt;
use std::sync::Arc;

use bowbus_frame::command::{self, status};
use bowbus_frame::{crc8, Message, MessageKind};

use crate::display;
use crate::error::{byte_at, take, Result};
use crate::fields::{parse_get_request, parse_put_request, parse_values};
use crate::format::hex;
use crate::names::NameTables;

/// Integrity problem found on a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Defect {
    /// Frame length differs from the size its header declares.
    SizeMismatch,
    /// Trailing byte is not the CRC of the bytes before it.
    CrcMismatch,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch => f.write_str("SIZE MISMATCH"),
            Self::CrcMismatch => f.write_str("CRC MISMATCH"),
        }
    }
}

/// Renders messages using a set of name tables.
#[derive(Debug, Clone)]
pub struct Decoder {
    names: Arc<NameTables>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(NameTables::builtin())
    }
}

impl Decoder {
    pub fn new(names: NameTables) -> Self {
        Self::with_shared(Arc::new(names))
    }

    /// Decoder over tables shared with other decoders.
    pub fn with_shared(names: Arc<NameTables>) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &NameTables {
        &self.names
    }

    /// Size and checksum defects of a frame. Both checks always run.
    pub fn check(&self, message: &Message) -> Vec<Defect> {
        let raw = message.raw();
        let mut defects = Vec::new();
        if raw.len() != message.declared_size() {
            defects.push(Defect::SizeMismatch);
        }
        match raw.split_last() {
            Some((&crc, body)) if crc8(body) == crc => {}
            _ => defects.push(Defect::CrcMismatch),
        }
        defects
    }

    /// Render a message as text.
    ///
    /// Fails only when a known layout does not fit the payload; unknown
    /// commands fall back to hex.
    pub fn decode(&self, message: &Message) -> Result<String> {
        match message.kind() {
            MessageKind::Handoff => Ok("HANDOFF".to_string()),
            MessageKind::Ping => Ok("PING!".to_string()),
            MessageKind::Pong => Ok("PONG!".to_string()),
            MessageKind::Request | MessageKind::Response => self.decode_command(message),
            MessageKind::Unknown(_) => Ok(String::new()),
        }
    }

    /// Defects if there are any, otherwise the decoded text.
    pub fn describe(&self, message: &Message) -> String {
        let defects = self.check(message);
        if !defects.is_empty() {
            return defects.iter().map(|d| format!(" {d}")).collect();
        }
        match self.decode(message) {
            Ok(text) => text,
            Err(err) => {
                tracing::debug!(error = %err, raw = %hex(message.raw()), "decode failed");
                format!("DECODE ERROR: {err}")
            }
        }
    }

    fn decode_command(&self, message: &Message) -> Result<String> {
        let cmd = byte_at(message.raw(), 3)?;
        let label = self.names.commands.label(cmd);
        let payload = message.payload();
        let request = message.is_request();

        let mut out = if request {
            format!("{label} {}", hex(payload))
        } else {
            format!("{label} - OK {}", hex(payload))
        };

        match cmd {
            command::GET_DATA if request => out.push_str(&self.get_request(payload)?),
            command::GET_DATA => out.push_str(&self.get_response(message)?),
            command::PUT_DATA if request => out.push_str(&self.put_request(payload)?),
            command::PUT_DATA => out.push_str(&self.put_response(message)?),
            command::ERROR_CODE if request => {
                out = format!("{label}: E-00{}", hex(take(payload, 0, 1)?));
            }
            command::SERIAL if !request => {
                out = format!(
                    "{label} - OK {} {} ({})",
                    hex(take(payload, 0, 2)?),
                    hex(take(payload, 6, 2)?),
                    hex(payload)
                );
            }
            command::MODE_CHANGE if request => {
                out.push_str(&display::render_mode_change(payload)?);
            }
            command::DISPLAY_UPDATE | command::DISPLAY_UPDATE_ALT if request => {
                out.push_str(&display::render_update(payload)?);
            }
            command::DISPLAY_STATE if request => {
                out.push_str(&display::render_state(payload)?);
            }
            _ => {}
        }
        Ok(out)
    }

    fn get_request(&self, payload: &[u8]) -> Result<String> {
        Ok(parse_get_request(payload)?
            .iter()
            .map(|field| field.label(&self.names.data_ids))
            .collect())
    }

    fn get_response(&self, message: &Message) -> Result<String> {
        let payload = message.payload();
        let code = byte_at(payload, 0)?;
        if code != status::OK {
            return Ok(status_text(code));
        }

        let values = parse_values(&payload[1..])?;
        let data_ids = &self.names.data_ids;
        let fields = match paired_request(message, command::GET_DATA) {
            Some(request) => parse_get_request(request.payload())?,
            None => Vec::new(),
        };

        // values beyond the paired request's fields keep their own labels
        let mut out = String::new();
        for (index, value) in values.iter().enumerate() {
            match fields.get(index) {
                Some(field) => out.push_str(&field.label(data_ids)),
                None => out.push_str(&value.label(data_ids)),
            }
            out.push_str(": ");
            out.push_str(&value.render_value());
        }
        Ok(out)
    }

    fn put_request(&self, payload: &[u8]) -> Result<String> {
        let mut out = String::new();
        for field in parse_put_request(payload)? {
            out.push_str(&field.label(&self.names.data_ids));
            out.push_str(": ");
            out.push_str(&field.render_value());
        }
        Ok(out)
    }

    fn put_response(&self, message: &Message) -> Result<String> {
        let code = byte_at(message.payload(), 0)?;
        if code != status::OK {
            return Ok(status_text(code));
        }
        match paired_request(message, command::PUT_DATA) {
            Some(request) => {
                let mut out = String::new();
                for field in parse_put_request(request.payload())? {
                    out.push_str(&field.label(&self.names.data_ids));
                    out.push_str(" STORED");
                }
                Ok(out)
            }
            None => Ok(" STORED".to_string()),
        }
    }
}

/// The linked request a response answers, if it carries the same command.
fn paired_request(message: &Message, cmd: u8) -> Option<&Message> {
    message
        .previous()
        .filter(|prev| prev.is_request() && prev.is_command(cmd))
}

fn status_text(code: u8) -> String {
    match code {
        status::NOT_FOUND => " NOT FOUND".to_string(),
        status::TYPE_MISMATCH => " TYPE MISMATCH".to_string(),
        other => format!(" STATUS {other:02x}"),
    }
}
