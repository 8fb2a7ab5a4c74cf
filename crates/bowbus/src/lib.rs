//! Tooling for the BOW e-bike serial bus.
//!
//! bowbus reads, decodes and drives the half-duplex bus shared by the
//! motor, battery and display of BOW-based e-bikes.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial ports and TCP serial bridges
//! - [`frame`]: start-byte framing, checksums and the command encoder
//! - [`codec`]: typed fields, value formatting and message rendering
//! - [`session`]: the request/response session driver and device
//!   procedures (behind the `session` feature)

/// Re-export transport types.
pub mod transport {
    pub use bowbus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bowbus_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use bowbus_codec::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use bowbus_session::*;
}
