//! Byte-stream transport for the BOW e-bike bus.
//!
//! Provides a unified interface over the ways a host reaches the bus:
//! - Local serial ports (USB-UART adapters, native UARTs)
//! - TCP bridges exposing a remote serial port (e.g. ser2net)
//!
//! This is the lowest layer of bowbus. Everything else builds on top of
//! the [`BusStream`] type provided here.

pub mod error;
pub mod serial;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use serial::{available_ports, PortInfo, SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
pub use traits::BusStream;
