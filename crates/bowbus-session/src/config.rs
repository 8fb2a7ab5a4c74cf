use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bowbus_codec::TypeFlags;
use bowbus_frame::reader::DEFAULT_READ_CHUNK;
use bowbus_frame::{device, Encoder, OutgoingFrame};

/// How a session gets from a flushed line to its first command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// Keep waking the battery until it answers.
    WakeupBat,
    /// Try to wake the battery, carry on without it if it stays silent.
    CheckBat,
    /// Drive the bus ourselves right after the flush.
    Direct,
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WakeupBat => f.write_str("wakeup-bat"),
            Self::CheckBat => f.write_str("check-bat"),
            Self::Direct => f.write_str("direct"),
        }
    }
}

/// Session driver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub mode: StartupMode,
    /// Read timeout; also the retry and poll interval.
    pub read_timeout: Duration,
    /// Bytes requested per read.
    pub read_chunk: usize,
    /// Send a wake-up byte on every n-th silent read while waiting for the battery.
    pub wake_interval: u32,
    /// Silent reads after which CHECK_BAT assumes there is no battery.
    pub check_bat_give_up: u32,
    /// Silent reads after which WAKEUP_BAT fails; `None` waits forever.
    pub wakeup_limit: Option<u32>,
    /// Received messages kept in the session log.
    pub log_capacity: usize,
    /// Device id the host sends as.
    pub source: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mode: StartupMode::Direct,
            read_timeout: bowbus_transport::DEFAULT_READ_TIMEOUT,
            read_chunk: DEFAULT_READ_CHUNK,
            wake_interval: 5,
            check_bat_give_up: 20,
            wakeup_limit: None,
            log_capacity: 10_000,
            source: device::PC,
        }
    }
}

impl SessionConfig {
    pub fn with_mode(mut self, mode: StartupMode) -> Self {
        self.mode = mode;
        self
    }
}

/// A typed field on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef {
    pub device: u8,
    pub descriptor: u8,
    pub id: u8,
}

impl FieldRef {
    pub const fn new(device: u8, descriptor: u8, id: u8) -> Self {
        Self {
            device,
            descriptor,
            id,
        }
    }

    pub fn flags(&self) -> TypeFlags {
        TypeFlags::new(self.descriptor)
    }

    /// GET DATA for the whole field (arrays from element 0).
    pub fn read(&self, encoder: &Encoder) -> bowbus_frame::Result<OutgoingFrame> {
        if self.flags().array() {
            encoder.get_data_array(self.device, self.descriptor, self.id, 0)
        } else {
            encoder.get_data(self.device, self.descriptor, self.id)
        }
    }

    /// PUT DATA replacing the field value (arrays from element 0).
    pub fn write(&self, encoder: &Encoder, value: &[u8]) -> bowbus_frame::Result<OutgoingFrame> {
        let flags = self.flags();
        if flags.array() {
            let count = value.len() / flags.element_size().max(1);
            let count = u8::try_from(count).unwrap_or(u8::MAX);
            encoder.put_data_array(self.device, self.descriptor, self.id, 0, count, value)
        } else {
            encoder.put_data(self.device, self.descriptor, self.id, value)
        }
    }

    /// Value bytes of a successful GET DATA response for this field.
    ///
    /// ```text
    /// scalar  [status][desc][id][value...]
    /// array   [status][desc][id][count][value...]
    /// ```
    pub fn value<'a>(&self, payload: &'a [u8]) -> &'a [u8] {
        let skip = if self.flags().array() { 4 } else { 3 };
        payload.get(skip..).unwrap_or_default()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:02x}:{:02x}",
            device::device_name(self.device),
            self.descriptor,
            self.id
        )
    }
}

impl FromStr for FieldRef {
    type Err = String;

    /// `DEVICE:DESC:ID`, each a code such as `0x02`, `12` or `#0c`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        let [dev, desc, id] = parts.as_slice() else {
            return Err(format!("expected DEVICE:DESC:ID, got '{s}'"));
        };
        let code = |part: &str, what: &str| {
            bowbus_codec::parse_code(part.trim())
                .ok_or_else(|| format!("invalid {what} '{part}' in '{s}'"))
        };
        let dev = code(*dev, "device")?;
        if !device::is_valid(dev) {
            return Err(format!("device id {dev:#04x} is out of range"));
        }
        Ok(Self::new(dev, code(*desc, "descriptor")?, code(*id, "id")?))
    }
}

/// Device fields touched by the pairing and error-clearing procedures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    /// Motor slots holding the serials of paired displays.
    pub display_serial_slots: [FieldRef; 2],
    /// The motor's own serial number.
    pub motor_serial: FieldRef,
    /// Battery slot holding the serial of the paired motor.
    pub battery_motor_serial: FieldRef,
    /// Battery error state.
    pub battery_error: FieldRef,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            display_serial_slots: [
                FieldRef::new(device::MOTOR, 0x40, 0x73),
                FieldRef::new(device::MOTOR, 0x40, 0x74),
            ],
            motor_serial: FieldRef::new(device::MOTOR, 0x40, 0x70),
            battery_motor_serial: FieldRef::new(device::BATTERY, 0x40, 0x71),
            battery_error: FieldRef::new(device::BATTERY, 0x00, 0x52),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.mode, StartupMode::Direct);
        assert_eq!(config.read_timeout, Duration::from_millis(225));
        assert_eq!(config.read_chunk, 1024);
        assert_eq!(config.wake_interval, 5);
        assert_eq!(config.check_bat_give_up, 20);
        assert_eq!(config.wakeup_limit, None);
        assert_eq!(config.source, device::PC);
        assert_eq!(
            config.with_mode(StartupMode::CheckBat).mode,
            StartupMode::CheckBat
        );
    }

    #[test]
    fn field_ref_parses() {
        let field: FieldRef = "0x02:0x40:#71".parse().unwrap();
        assert_eq!(field, FieldRef::new(device::BATTERY, 0x40, 0x71));
        assert_eq!(field.to_string(), "BATTERY/40:71");

        assert!("0x02:0x40".parse::<FieldRef>().is_err());
        assert!("0x20:0x40:0x71".parse::<FieldRef>().is_err());
        assert!("0x02:zz:0x71".parse::<FieldRef>().is_err());
    }

    #[test]
    fn field_ref_builds_reads_and_writes() {
        let encoder = Encoder::default();
        let array = FieldRef::new(device::MOTOR, 0x40, 0x73);
        assert_eq!(
            array.read(&encoder).unwrap().raw(),
            encoder.get_data_array(device::MOTOR, 0x40, 0x73, 0).unwrap().raw()
        );
        assert_eq!(
            array.write(&encoder, &[1, 2, 3]).unwrap().raw(),
            encoder
                .put_data_array(device::MOTOR, 0x40, 0x73, 0, 3, &[1, 2, 3])
                .unwrap()
                .raw()
        );

        let scalar = FieldRef::new(device::BATTERY, 0x04, 0x52);
        assert_eq!(
            scalar.read(&encoder).unwrap().raw(),
            encoder.get_data(device::BATTERY, 0x04, 0x52).unwrap().raw()
        );
        assert_eq!(
            scalar.write(&encoder, &[0, 0]).unwrap().raw(),
            encoder.put_data(device::BATTERY, 0x04, 0x52, &[0, 0]).unwrap().raw()
        );
    }

    #[test]
    fn field_value_skips_response_header() {
        let array = FieldRef::new(device::MOTOR, 0x40, 0x73);
        assert_eq!(array.value(&[0x00, 0x40, 0x73, 0x02, 0xAA, 0xBB]), &[0xAA, 0xBB]);
        let scalar = FieldRef::new(device::BATTERY, 0x00, 0x52);
        assert_eq!(scalar.value(&[0x00, 0x00, 0x52, 0x07]), &[0x07]);
        assert!(scalar.value(&[0x01]).is_empty());
    }
}
