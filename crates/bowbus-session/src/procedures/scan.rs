use std::sync::Arc;

use bowbus_codec::{hex, Decoder, TypeFlags};
use bowbus_frame::command::{self, status};
use bowbus_frame::{device, Encoder, Message, OutgoingFrame};

use super::{is_reply, status_of};
use crate::config::StartupMode;
use crate::error::{Result, SessionError};
use crate::procedure::{Procedure, Step};
use crate::report::Reporter;

/// Descriptors tried first. Fields missing under the first one are
/// assumed absent altogether.
pub const PRIORITY_TYPES: [u8; 9] = [0x00, 0x04, 0x08, 0x14, 0x28, 0x70, 0x40, 0x44, 0x48];

/// One field value found by a [`Scan`].
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub descriptor: u8,
    pub id: u8,
    /// Array offset the value was read from; 0 for scalars.
    pub offset: u8,
    pub request: Message,
    /// The response, linked to `request`.
    pub response: Message,
}

impl ScanResult {
    pub fn render(&self, decoder: &Decoder) -> String {
        let decoded = decoder
            .decode(&self.response)
            .unwrap_or_else(|err| format!("DECODE ERROR: {err}"));
        format!(
            "Req: {}, Resp: {}, Decoded: {decoded}",
            hex(self.request.raw()),
            hex(self.response.raw())
        )
    }
}

/// Reads every data id under every candidate descriptor from one device.
#[derive(Debug, Clone)]
pub struct Scan {
    target: u8,
    host: u8,
    types: Vec<u8>,
    to_scan: Vec<u8>,
    type_pos: usize,
    id_pos: usize,
    offset: u8,
    request: Option<Message>,
    results: Vec<ScanResult>,
}

impl Default for Scan {
    fn default() -> Self {
        Self::new(device::DISPLAY)
    }
}

impl Scan {
    /// Scan `target` with the default descriptor list.
    pub fn new(target: u8) -> Self {
        Self::with_types(target, Self::default_types())
    }

    /// Scan `target` trying `types` in order. Duplicates are dropped.
    pub fn with_types(target: u8, types: impl IntoIterator<Item = u8>) -> Self {
        let mut unique = Vec::new();
        for descriptor in types {
            if !unique.contains(&descriptor) {
                unique.push(descriptor);
            }
        }
        Self {
            target,
            host: device::PC,
            types: unique,
            to_scan: (0..=u8::MAX).collect(),
            type_pos: 0,
            id_pos: 0,
            offset: 0,
            request: None,
            results: Vec::new(),
        }
    }

    /// [`PRIORITY_TYPES`] followed by every other descriptor without the
    /// `more` bit.
    pub fn default_types() -> Vec<u8> {
        let rest = (0x00..=0x7F).filter(|descriptor| !PRIORITY_TYPES.contains(descriptor));
        PRIORITY_TYPES.iter().copied().chain(rest).collect()
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn types(&self) -> &[u8] {
        &self.types
    }

    /// Values found so far; sorted by id once the scan is done.
    pub fn results(&self) -> &[ScanResult] {
        &self.results
    }

    pub fn into_results(self) -> Vec<ScanResult> {
        self.results
    }

    fn descriptor(&self) -> u8 {
        self.types[self.type_pos]
    }

    fn record(&mut self, message: &Message, reporter: &Reporter) {
        let Some(request) = self.request.clone() else {
            return;
        };
        let descriptor = self.descriptor();
        let id = self.to_scan[self.id_pos];
        reporter.line(format!(
            "Found {descriptor:02x}:{id:02x}[{}]: {}",
            self.offset,
            hex(message.payload())
        ));
        let response = message
            .clone()
            .with_previous(Some(Arc::new(request.clone())));
        self.results.push(ScanResult {
            descriptor,
            id,
            offset: self.offset,
            request,
            response,
        });
    }

    /// Move past the current id, to the next descriptor if this one is
    /// exhausted. Returns false once there is nothing left to try.
    fn advance(&mut self, reporter: &Reporter) -> bool {
        if self.id_pos < self.to_scan.len() {
            return true;
        }
        if self.to_scan.is_empty() || self.type_pos + 1 >= self.types.len() {
            return false;
        }
        self.type_pos += 1;
        self.id_pos = 0;
        reporter.line(format!(
            "Scanning type {:02x}, {} ids left",
            self.descriptor(),
            self.to_scan.len()
        ));
        true
    }
}

impl Procedure for Scan {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn startup_mode(&self) -> StartupMode {
        StartupMode::Direct
    }

    fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame> {
        self.host = encoder.source();
        let (Some(&descriptor), Some(&id)) =
            (self.types.get(self.type_pos), self.to_scan.get(self.id_pos))
        else {
            return Err(SessionError::InvalidProcedure(
                "scan has no candidates left".to_string(),
            ));
        };

        let frame = if TypeFlags::new(descriptor).array() {
            encoder.get_data_array(self.target, descriptor, id, self.offset)?
        } else {
            encoder.get_data(self.target, descriptor, id)?
        };
        self.request = Message::from_frame(frame.raw().clone());
        Ok(frame)
    }

    fn handle_response(&mut self, message: &Message, reporter: &Reporter) -> Step {
        if !is_reply(message, self.host, self.target, command::GET_DATA) {
            return Step::Continue;
        }
        if self.id_pos >= self.to_scan.len() {
            return Step::Done;
        }

        match status_of(message) {
            status::NOT_FOUND => {
                if self.type_pos == 0 {
                    self.to_scan.remove(self.id_pos);
                } else {
                    self.id_pos += 1;
                }
                self.offset = 0;
            }
            status::TYPE_MISMATCH => {
                self.id_pos += 1;
                self.offset = 0;
            }
            _ => {
                let array = TypeFlags::new(self.descriptor()).array();
                let count = if array {
                    message.payload().get(3).copied().unwrap_or(0)
                } else {
                    0
                };
                if !(array && count == 0 && self.offset > 0) {
                    self.record(message, reporter);
                }
                match self.offset.checked_add(count) {
                    Some(next) if array && count > 0 => {
                        // same id again, from the next unread element
                        self.offset = next;
                        return Step::SendCommand;
                    }
                    _ => {
                        self.to_scan.remove(self.id_pos);
                        self.offset = 0;
                    }
                }
            }
        }

        if self.advance(reporter) {
            Step::SendCommand
        } else {
            self.results.sort_by_key(|result| result.id);
            reporter.line(format!("Scan done, {} values found", self.results.len()));
            Step::Done
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::sim::{Bus, ScriptedDevice};

    /// Display holding a byte at 00:05, a u16 at 04:10 and a 3-byte
    /// array at 40:20.
    fn display_with_three_fields() -> ScriptedDevice {
        ScriptedDevice::new(|request: &Message| {
            if request.target() != device::DISPLAY || !request.is_command(command::GET_DATA) {
                return Vec::new();
            }
            let payload = request.payload();
            let (descriptor, id) = (payload[0], payload[1]);
            let body = match (id, descriptor) {
                (0x05, 0x00) => vec![0x00, 0x00, 0x05, 0x07],
                (0x10, 0x04) => vec![0x00, 0x04, 0x10, 0x01, 0x2C],
                (0x20, 0x40) => {
                    let data = [0x0A, 0x0B, 0x0C];
                    let rest = &data[usize::from(payload[2]).min(data.len())..];
                    let mut body = vec![0x00, 0x40, 0x20, rest.len() as u8];
                    body.extend_from_slice(rest);
                    body
                }
                (0x05 | 0x10 | 0x20, _) => vec![status::TYPE_MISMATCH],
                _ => vec![status::NOT_FOUND],
            };
            let display = Encoder::new(device::DISPLAY).unwrap();
            vec![display
                .response(request.source().unwrap(), command::GET_DATA, &body)
                .unwrap()]
        })
    }

    #[test]
    fn default_types_start_with_priority_list() {
        let types = Scan::default_types();
        assert_eq!(&types[..9], &PRIORITY_TYPES);
        assert_eq!(types.len(), 128);
        assert!(types.iter().all(|descriptor| descriptor & 0x80 == 0));
        let mut sorted = types.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), types.len());
    }

    #[test]
    fn with_types_drops_duplicates() {
        let scan = Scan::with_types(device::DISPLAY, [0x04, 0x00, 0x04]);
        assert_eq!(scan.types(), &[0x04, 0x00]);
    }

    #[test]
    fn scan_finds_exactly_the_present_fields() {
        let bus = Bus::new(display_with_three_fields());
        let mut session = bus.session(SessionConfig::default());
        let mut scan = Scan::default();

        let outcome = session.run(&mut scan).unwrap();
        let results = scan.results();
        let ids: Vec<(u8, u8, u8)> = results
            .iter()
            .map(|r| (r.descriptor, r.id, r.offset))
            .collect();
        assert_eq!(ids, vec![(0x00, 0x05, 0), (0x04, 0x10, 0), (0x40, 0x20, 0)]);

        // 256 ids under 00, two under 04, one under each of 08 14 28 70,
        // then the array at offsets 0 and 3
        assert_eq!(outcome.commands_sent, 256 + 2 + 4 + 2);

        let decoder = Decoder::default();
        assert!(results[1].render(&decoder).ends_with(" 04:10: 300"));
        assert!(results[2].render(&decoder).ends_with(" 40:20[0]: 0a0b0c"));
    }

    #[test]
    fn unrelated_messages_are_ignored() {
        let mut scan = Scan::default();
        scan.build_next_command(&Encoder::default()).unwrap();
        let motor = Encoder::new(device::MOTOR).unwrap();
        let reply = motor
            .response(device::PC, command::GET_DATA, &[status::NOT_FOUND])
            .unwrap()
            .to_message()
            .unwrap();
        assert_eq!(
            scan.handle_response(&reply, &Reporter::silent()),
            Step::Continue
        );
    }

    #[test]
    fn not_found_on_first_type_drops_the_id() {
        let mut scan = Scan::with_types(device::DISPLAY, [0x00, 0x04]);
        let encoder = Encoder::default();
        let display = Encoder::new(device::DISPLAY).unwrap();
        let not_found = display
            .response(device::PC, command::GET_DATA, &[status::NOT_FOUND])
            .unwrap()
            .to_message()
            .unwrap();

        let first = scan.build_next_command(&encoder).unwrap();
        assert_eq!(first.raw().as_ref()[4..6], [0x00, 0x00]);
        assert_eq!(
            scan.handle_response(&not_found, &Reporter::silent()),
            Step::SendCommand
        );
        let second = scan.build_next_command(&encoder).unwrap();
        // id 00 is gone, id 01 is next
        assert_eq!(second.raw().as_ref()[4..6], [0x00, 0x01]);
    }
}
