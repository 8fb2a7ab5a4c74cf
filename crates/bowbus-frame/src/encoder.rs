use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{GET_DATA, PUT_DATA, WAKE_UP};
use crate::checksum::crc8;
use crate::device;
use crate::error::{FrameError, Result};
use crate::message::{Message, MessageKind, START_BYTE};

/// Largest payload the length nibble can describe.
pub const MAX_PAYLOAD_LEN: usize = 15;

/// A lone zero byte sent to nudge a sleeping battery.
pub const WAKE_UP_BYTE: u8 = 0x00;

/// An outgoing frame, unescaped: start byte first, checksum last.
///
/// This is exactly the byte sequence the framer reports as a message's
/// raw bytes once the frame has crossed the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    raw: Bytes,
}

impl OutgoingFrame {
    /// The unescaped frame.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    /// The frame as it goes on the wire, with inner `0x10` bytes doubled.
    pub fn to_wire(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(self.raw.len() + 4);
        escape(&self.raw, &mut dst);
        dst.freeze()
    }

    /// The frame viewed as a parsed message.
    pub fn to_message(&self) -> Option<Message> {
        Message::from_frame(self.raw.clone())
    }

    pub fn target(&self) -> u8 {
        self.raw.get(1).map_or(0, |hdr1| hdr1 >> 4)
    }

    pub fn command(&self) -> Option<u8> {
        let kind = MessageKind::from_nibble(*self.raw.get(1)?);
        if kind.has_command() {
            self.raw.get(3).copied()
        } else {
            None
        }
    }
}

/// Escape an unescaped frame for the wire.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────┬──────────────┬───────┬───────────────┬───────┐
/// │ 0x10 │ tgt<<4|kind  │ src<<4|len   │ cmd   │ payload (len) │ crc8  │
/// └──────┴──────────────┴──────────────┴───────┴───────────────┴───────┘
/// ```
/// Every `0x10` after the leading start byte is sent twice.
pub fn escape(frame: &[u8], dst: &mut BytesMut) {
    dst.reserve(frame.len() + 2);
    for (index, &byte) in frame.iter().enumerate() {
        dst.put_u8(byte);
        if index != 0 && byte == START_BYTE {
            dst.put_u8(byte);
        }
    }
}

fn finish(mut buf: BytesMut) -> OutgoingFrame {
    let crc = crc8(&buf);
    buf.put_u8(crc);
    OutgoingFrame { raw: buf.freeze() }
}

fn header1(target: u8, kind: MessageKind) -> Result<u8> {
    if !device::is_valid(target) {
        return Err(FrameError::InvalidDeviceId(target));
    }
    Ok((target << 4) | kind.code())
}

/// Builds outgoing frames on behalf of one source device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoder {
    source: u8,
}

impl Default for Encoder {
    fn default() -> Self {
        Self { source: device::PC }
    }
}

impl Encoder {
    /// Encoder sending as `source` instead of the PC.
    pub fn new(source: u8) -> Result<Self> {
        if !device::is_valid(source) {
            return Err(FrameError::InvalidDeviceId(source));
        }
        Ok(Self { source })
    }

    pub fn source(&self) -> u8 {
        self.source
    }

    /// Build a request or response frame.
    pub fn message(
        &self,
        target: u8,
        kind: MessageKind,
        command: u8,
        payload: &[u8],
    ) -> Result<OutgoingFrame> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FrameError::PayloadTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(payload.len() + 5);
        buf.put_u8(START_BYTE);
        buf.put_u8(header1(target, kind)?);
        buf.put_u8((self.source << 4) | payload.len() as u8);
        buf.put_u8(command);
        buf.put_slice(payload);
        Ok(finish(buf))
    }

    /// Build a request frame.
    pub fn command(&self, target: u8, command: u8, payload: &[u8]) -> Result<OutgoingFrame> {
        self.message(target, MessageKind::Request, command, payload)
    }

    /// Build a response frame.
    pub fn response(&self, target: u8, command: u8, payload: &[u8]) -> Result<OutgoingFrame> {
        self.message(target, MessageKind::Response, command, payload)
    }

    pub fn ping(&self, target: u8) -> Result<OutgoingFrame> {
        self.short(target, MessageKind::Ping)
    }

    pub fn pong(&self, target: u8) -> Result<OutgoingFrame> {
        self.short(target, MessageKind::Pong)
    }

    fn short(&self, target: u8, kind: MessageKind) -> Result<OutgoingFrame> {
        let mut buf = BytesMut::with_capacity(4);
        buf.put_u8(START_BYTE);
        buf.put_u8(header1(target, kind)?);
        buf.put_u8(self.source << 4);
        Ok(finish(buf))
    }

    /// Hand the bus to `target`.
    pub fn handoff(&self, target: u8) -> Result<OutgoingFrame> {
        let mut buf = BytesMut::with_capacity(3);
        buf.put_u8(START_BYTE);
        buf.put_u8(header1(target, MessageKind::Handoff)?);
        Ok(finish(buf))
    }

    pub fn wake_up(&self, target: u8) -> Result<OutgoingFrame> {
        self.command(target, WAKE_UP, &[])
    }

    /// GET DATA for a scalar field.
    pub fn get_data(&self, target: u8, descriptor: u8, id: u8) -> Result<OutgoingFrame> {
        self.command(target, GET_DATA, &[descriptor, id])
    }

    /// GET DATA for an array field, starting at element `offset`.
    pub fn get_data_array(
        &self,
        target: u8,
        descriptor: u8,
        id: u8,
        offset: u8,
    ) -> Result<OutgoingFrame> {
        self.command(target, GET_DATA, &[descriptor, id, offset])
    }

    /// PUT DATA for a scalar field.
    pub fn put_data(&self, target: u8, descriptor: u8, id: u8, value: &[u8]) -> Result<OutgoingFrame> {
        let mut payload = Vec::with_capacity(value.len() + 2);
        payload.extend_from_slice(&[descriptor, id]);
        payload.extend_from_slice(value);
        self.command(target, PUT_DATA, &payload)
    }

    /// PUT DATA for `count` array elements starting at element `from`.
    ///
    /// `elements` holds the element bytes back to back.
    pub fn put_data_array(
        &self,
        target: u8,
        descriptor: u8,
        id: u8,
        from: u8,
        count: u8,
        elements: &[u8],
    ) -> Result<OutgoingFrame> {
        let to = from.saturating_add(count);
        let mut payload = Vec::with_capacity(elements.len() + 5);
        payload.extend_from_slice(&[descriptor, id, from, to, count]);
        payload.extend_from_slice(elements);
        self.command(target, PUT_DATA, &payload)
    }
}
