//! Request/response sessions on the BOW e-bike bus.
//!
//! A [`Session`] owns one bus connection and drives a [`Procedure`]
//! through it: flush the line, optionally wait for the battery to wake
//! up, then alternate between sending the procedure's next command and
//! feeding it responses until it reports it is done.
//!
//! Four procedures ship with the crate: a data-id [`Scan`], display and
//! battery pairing, and clearing the battery error state.

pub mod config;
pub mod connector;
pub mod error;
pub mod log;
pub mod procedure;
pub mod procedures;
pub mod report;
pub mod session;

#[cfg(test)]
pub(crate) mod sim;

pub use config::{FieldMap, FieldRef, SessionConfig, StartupMode};
pub use connector::{connect_tcp, open_serial, session_for_stream};
pub use error::{Result, SessionError};
pub use log::MessageLog;
pub use procedure::{Procedure, Step, WriteOutcome};
pub use procedures::{status_name, BatteryPairing, ClearError, DisplayPairing, Scan, ScanResult};
pub use report::Reporter;
pub use session::{Session, SessionOutcome};
