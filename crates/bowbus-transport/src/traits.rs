use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A connected bus stream — implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations.
/// Wraps either a local serial port or a TCP connection to a serial bridge.
pub struct BusStream {
    inner: BusStreamInner,
    name: String,
}

enum BusStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    Tcp(TcpStream),
}

impl Read for BusStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.read(buf),
            BusStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for BusStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.write(buf),
            BusStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port.flush(),
            BusStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl BusStream {
    pub(crate) fn from_serial(port: Box<dyn serialport::SerialPort>, name: String) -> Self {
        Self {
            inner: BusStreamInner::Serial(port),
            name,
        }
    }

    pub(crate) fn from_tcp(stream: TcpStream, name: String) -> Self {
        Self {
            inner: BusStreamInner::Tcp(stream),
            name,
        }
    }

    /// Set the read timeout used as the bus poll interval.
    ///
    /// A read that sees no bytes within `timeout` fails with
    /// `TimedOut` or `WouldBlock`, depending on the platform and transport.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        match &mut self.inner {
            BusStreamInner::Serial(port) => port
                .set_timeout(timeout)
                .map_err(TransportError::Configure),
            BusStreamInner::Tcp(stream) => stream.set_read_timeout(Some(timeout)).map_err(Into::into),
        }
    }

    /// Try to clone this stream (a second handle onto the same port).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            BusStreamInner::Serial(port) => {
                BusStreamInner::Serial(port.try_clone().map_err(TransportError::Configure)?)
            }
            BusStreamInner::Tcp(stream) => BusStreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            name: self.name.clone(),
        })
    }

    /// Port path or bridge address this stream was opened on.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            BusStreamInner::Serial(_) => "serial",
            BusStreamInner::Tcp(_) => "tcp",
        }
    }
}

impl std::fmt::Debug for BusStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusStream")
            .field("type", &self.transport_name())
            .field("name", &self.name)
            .finish()
    }
}
