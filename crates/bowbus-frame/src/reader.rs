use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Duration;

use bowbus_transport::BusStream;

use crate::error::{FrameError, Result};
use crate::framer::{Framer, FramerEvent};

/// Bytes requested per read call.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Frame reader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Bytes requested per read call.
    pub chunk_size: usize,
    /// Poll interval applied to bus streams; `None` leaves the stream as is.
    pub read_timeout: Option<Duration>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_READ_CHUNK,
            read_timeout: Some(bowbus_transport::DEFAULT_READ_TIMEOUT),
        }
    }
}

/// Result of one read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read timed out: the bus is quiet.
    Idle,
    /// This many bytes arrived and were fed to the framer.
    Data(usize),
}

/// Reads bus bytes from any `Read` stream and cuts them into messages.
///
/// Completed and interrupted frames queue up as [`FramerEvent`]s until the
/// caller drains them.
pub struct FrameReader<T> {
    inner: T,
    framer: Framer,
    events: VecDeque<FramerEvent>,
    chunk: Vec<u8>,
    config: ReaderConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: ReaderConfig) -> Self {
        Self {
            inner,
            framer: Framer::new(),
            events: VecDeque::new(),
            chunk: vec![0u8; config.chunk_size.max(1)],
            config,
        }
    }

    /// Read once and feed whatever arrived to the framer.
    ///
    /// A timeout is not an error: it reports [`ReadOutcome::Idle`]. End of
    /// stream is [`FrameError::ConnectionClosed`].
    pub fn poll(&mut self) -> Result<ReadOutcome> {
        let read = match self.read_chunk()? {
            Some(read) => read,
            None => return Ok(ReadOutcome::Idle),
        };

        let events = &mut self.events;
        self.framer
            .feed_slice(&self.chunk[..read], |event| events.push_back(event));
        Ok(ReadOutcome::Data(read))
    }

    /// Read once and throw the bytes away. Returns how many were discarded.
    pub fn discard(&mut self) -> Result<usize> {
        Ok(self.read_chunk()?.unwrap_or(0))
    }

    /// Take the oldest queued event.
    pub fn next_event(&mut self) -> Option<FramerEvent> {
        self.events.pop_front()
    }

    fn read_chunk(&mut self) -> Result<Option<usize>> {
        loop {
            match self.inner.read(&mut self.chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => return Ok(Some(n)),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) =>
                {
                    return Ok(None)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the framer (e.g. to inspect the last message).
    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

impl FrameReader<BusStream> {
    /// Create a frame reader for `BusStream` and apply the read timeout from config.
    pub fn with_config_bus(mut inner: BusStream, config: ReaderConfig) -> Result<Self> {
        if let Some(timeout) = config.read_timeout {
            inner
                .set_read_timeout(timeout)
                .map_err(transport_to_frame_error)?;
        }
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: bowbus_transport::TransportError) -> FrameError {
    match err {
        bowbus_transport::TransportError::Io(io) => FrameError::Io(io),
        bowbus_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
