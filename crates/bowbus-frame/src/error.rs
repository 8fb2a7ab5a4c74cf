/// Errors that can occur while building, sending or receiving frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload does not fit the 4-bit length nibble.
    #[error("payload too long ({len} bytes, max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// A device id does not fit in a header nibble.
    #[error("invalid device id 0x{0:02x} (max 0x0f)")]
    InvalidDeviceId(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer hung up: a read hit end of stream or a write was refused.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
