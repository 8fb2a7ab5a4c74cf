use bowbus_frame::{Encoder, Message, OutgoingFrame};

use crate::config::StartupMode;
use crate::error::Result;
use crate::report::Reporter;

/// What the session does after a procedure looked at a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Not the awaited answer; keep waiting.
    Continue,
    /// Send the procedure's next command.
    SendCommand,
    /// The procedure is finished.
    Done,
}

/// Result of a read-compare-write-verify procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device already held the wanted value; nothing was written.
    Unchanged,
    /// The value was written and read back.
    Written { verified: bool },
    /// The device answered a read or write with a non-OK status.
    Rejected { status: u8 },
}

/// A scripted exchange driven by a [`Session`](crate::Session).
///
/// The session calls [`build_next_command`](Self::build_next_command)
/// whenever it is time to send, including after a response timeout, so a
/// procedure that has not advanced simply repeats its last command.
pub trait Procedure {
    fn name(&self) -> &'static str;

    /// How the session should start before the first command.
    fn startup_mode(&self) -> StartupMode;

    fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame>;

    /// Offered every message received while a response is awaited.
    fn handle_response(&mut self, message: &Message, reporter: &Reporter) -> Step;
}
