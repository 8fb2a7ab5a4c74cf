use std::net::TcpStream;
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

impl BusStream {
    /// Connect to a TCP bridge that forwards raw bus bytes (e.g. ser2net).
    pub fn connect_tcp(addr: &str, read_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(read_timeout))?;
        debug!(addr, "connected to serial bridge");
        Ok(Self::from_tcp(stream, addr.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn tcp_bridge_carries_bytes_both_ways() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let bridge = thread::spawn(move || {
            let (mut conn, _) = listener.accept().unwrap();
            let mut buf = [0u8; 5];
            conn.read_exact(&mut buf).unwrap();
            conn.write_all(&buf).unwrap();
        });

        let mut stream = BusStream::connect_tcp(&addr, Duration::from_secs(2)).unwrap();
        assert_eq!(stream.transport_name(), "tcp");
        assert_eq!(stream.name(), addr);

        stream.write_all(&[0x10, 0x21, 0x40, 0x14, 0x76]).unwrap();
        let mut echoed = [0u8; 5];
        stream.read_exact(&mut echoed).unwrap();
        assert_eq!(echoed, [0x10, 0x21, 0x40, 0x14, 0x76]);

        bridge.join().unwrap();
    }

    #[test]
    fn connect_refused_reports_address() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = BusStream::connect_tcp(&addr, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
    }
}
