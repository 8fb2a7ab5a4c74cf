//! Start-byte framing, escaping and checksums for the BOW e-bike bus.
//!
//! Every message on the bus is framed as:
//! - A `0x10` start byte (any `0x10` inside the frame is doubled on the wire)
//! - A header byte carrying the target device and message kind
//! - A header byte carrying the source device and payload length (absent for handoffs)
//! - For requests and responses, a command byte and up to 15 payload bytes
//! - A trailing CRC-8 over everything before it
//!
//! The [`Framer`] recovers [`Message`]s from a raw byte stream one byte at a
//! time; the [`Encoder`] builds outgoing frames that the framer accepts.

pub mod command;
pub mod checksum;
pub mod device;
pub mod encoder;
pub mod error;
pub mod framer;
pub mod message;
pub mod reader;
pub mod writer;

pub use checksum::{crc8, BUS_CRC, CRC_8_BUS};
pub use encoder::{escape, Encoder, OutgoingFrame, MAX_PAYLOAD_LEN, WAKE_UP_BYTE};
pub use error::{FrameError, Result};
pub use framer::{Framer, FramerEvent};
pub use message::{declared_size, Message, MessageKind, START_BYTE};
pub use reader::{FrameReader, ReadOutcome, ReaderConfig};
pub use writer::FrameWriter;
