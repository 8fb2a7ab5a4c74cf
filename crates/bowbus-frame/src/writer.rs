use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use bowbus_transport::BusStream;
use tracing::trace;

use crate::encoder::{escape, OutgoingFrame, WAKE_UP_BYTE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Writes escaped frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Escape and send a complete frame (blocking).
    pub fn send(&mut self, frame: &OutgoingFrame) -> Result<()> {
        self.buf.clear();
        escape(frame.raw(), &mut self.buf);
        trace!(len = self.buf.len(), "sending frame");

        let wire = self.buf.split();
        self.write_all(&wire)?;
        self.flush()
    }

    /// Send bytes exactly as given, without framing or escaping.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all(bytes)?;
        self.flush()
    }

    /// Send the single zero byte that wakes a sleeping battery.
    pub fn send_wake_up_byte(&mut self) -> Result<()> {
        self.send_raw(&[WAKE_UP_BYTE])
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl FrameWriter<BusStream> {
    /// Create a frame writer for `BusStream`.
    pub fn for_bus(inner: BusStream) -> Self {
        Self::new(inner)
    }
}
