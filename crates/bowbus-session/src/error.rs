/// Errors that can end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] bowbus_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] bowbus_frame::FrameError),

    /// The device never woke up within the configured number of read timeouts.
    #[error("no response from device after {timeouts} read timeouts")]
    DeviceTimeout { timeouts: u32 },

    /// A procedure was set up with arguments it cannot work with.
    #[error("invalid procedure setup: {0}")]
    InvalidProcedure(String),

    /// The session was cancelled from another thread.
    #[error("session cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, SessionError>;
