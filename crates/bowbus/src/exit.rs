use std::fmt;
use std::io;

use bowbus_codec::CodecError;
use bowbus_frame::FrameError;
use bowbus_session::SessionError;
use bowbus_transport::TransportError;

// Exit codes shared by every subcommand.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;
pub const CANCELLED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

fn serial_error(context: &str, err: &serialport::Error) -> CliError {
    let code = match err.kind() {
        serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied) => PERMISSION_DENIED,
        serialport::ErrorKind::NoDevice => FAILURE,
        serialport::ErrorKind::InvalidInput => USAGE,
        _ => TRANSPORT_ERROR,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::Open { ref source, .. } => serial_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLong { .. } | FrameError::InvalidDeviceId(_) => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::DeviceTimeout { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::InvalidProcedure(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::Cancelled => CliError::new(CANCELLED, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_exit_codes() {
        assert_eq!(
            session_error("run", SessionError::Cancelled).code,
            CANCELLED
        );
        assert_eq!(
            session_error("run", SessionError::DeviceTimeout { timeouts: 40 }).code,
            TIMEOUT
        );
        let refused = SessionError::Transport(TransportError::Connect {
            addr: "127.0.0.1:1".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        assert_eq!(session_error("connect", refused).code, FAILURE);
    }

    #[test]
    fn frame_build_errors_are_usage_errors() {
        let err = frame_error("encode", FrameError::InvalidDeviceId(0x12));
        assert_eq!(err.code, USAGE);
        assert!(err.message.starts_with("encode: "));
    }

    #[test]
    fn bridge_hang_up_is_a_transport_error() {
        let err = session_error("scan failed", SessionError::Frame(FrameError::ConnectionClosed));
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert_eq!(err.message, "scan failed: connection closed");
    }
}
