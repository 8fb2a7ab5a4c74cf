//! Typed-field codec and message renderers for the BOW e-bike bus.
//!
//! Turns framed [`Message`](bowbus_frame::Message)s into human-readable text:
//! fixed layouts for the known commands, and a generic walker for the
//! bit-flagged typed fields carried by GET DATA and PUT DATA.
//!
//! Names for devices, commands and data ids come from [`NameTables`], which
//! can be loaded from a JSON file. Unknown codes always render as hex.

pub mod config;
pub mod decoder;
pub mod display;
pub mod error;
pub mod fields;
pub mod format;
pub mod names;
pub mod type_flags;

pub use config::NameTableConfig;
pub use decoder::{Decoder, Defect};
pub use error::{CodecError, Result};
pub use fields::{
    parse_get_request, parse_put_request, parse_values, ArrayRange, GetField, PutField,
    ValueField,
};
pub use format::{as_float32, as_int, as_text, as_uint, hex};
pub use names::{parse_code, NameTable, NameTables};
pub use type_flags::{Formatter, TypeFlags, ValueKind};
