use std::path::Path;

use bowbus_frame::{FrameReader, FrameWriter, ReaderConfig};
use bowbus_transport::{BusStream, SerialConfig};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// A session on a local serial port.
///
/// The port's read timeout is taken from `config`; `serial` only
/// contributes the line settings.
pub fn open_serial(
    path: impl AsRef<Path>,
    serial: SerialConfig,
    config: SessionConfig,
) -> Result<Session<BusStream, BusStream>> {
    let serial = SerialConfig {
        read_timeout: config.read_timeout,
        ..serial
    };
    let stream = BusStream::open_serial(path, serial)?;
    session_for_stream(stream, config)
}

/// A session on a TCP bridge forwarding raw bus bytes.
pub fn connect_tcp(addr: &str, config: SessionConfig) -> Result<Session<BusStream, BusStream>> {
    let stream = BusStream::connect_tcp(addr, config.read_timeout)?;
    session_for_stream(stream, config)
}

/// Split an open stream into a frame reader and writer and wrap them in a
/// session.
pub fn session_for_stream(
    stream: BusStream,
    config: SessionConfig,
) -> Result<Session<BusStream, BusStream>> {
    let read_half = stream.try_clone()?;
    let reader = FrameReader::with_config_bus(
        read_half,
        ReaderConfig {
            chunk_size: config.read_chunk,
            read_timeout: Some(config.read_timeout),
        },
    )?;
    let writer = FrameWriter::for_bus(stream);
    debug!(
        transport = writer.get_ref().transport_name(),
        bus = writer.get_ref().name(),
        mode = %config.mode,
        "session ready"
    );
    Session::new(reader, writer, config)
}
