use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// Baud rate used by the bus when talking to motor, battery and display.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Semi-blocking read timeout; doubles as the session poll interval.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(225);

/// Serial line settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl BusStream {
    /// Open a local serial port (8N1, no flow control).
    pub fn open_serial(path: impl AsRef<Path>, config: SerialConfig) -> Result<Self> {
        let path = path.as_ref();
        let name = path.to_string_lossy().into_owned();
        let port = serialport::new(name.as_str(), config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        info!(port = %name, baud = config.baud_rate, "serial port open");
        Ok(Self::from_serial(port, name))
    }
}

/// A serial port found on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    pub kind: &'static str,
    pub description: Option<String>,
}

/// Enumerate the serial ports present on this host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    debug!(count = ports.len(), "enumerated serial ports");

    Ok(ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                serialport::SerialPortType::UsbPort(usb) => {
                    let mut text = format!("vid={:04x} pid={:04x}", usb.vid, usb.pid);
                    if let Some(product) = usb.product {
                        text.push(' ');
                        text.push_str(&product);
                    }
                    ("usb", Some(text))
                }
                serialport::SerialPortType::BluetoothPort => ("bluetooth", None),
                serialport::SerialPortType::PciPort => ("pci", None),
                serialport::SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect())
}
