use bowbus_codec::hex;
use bowbus_frame::command::{self, status};
use bowbus_frame::{device, Encoder, Message, OutgoingFrame};

use super::{is_reply, status_name, status_of};
use crate::config::{FieldMap, FieldRef, StartupMode};
use crate::error::{Result, SessionError};
use crate::procedure::{Procedure, Step, WriteOutcome};
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    GetDisplaySerial,
    GetStoredSerial,
    PutSerial,
    CheckStoredSerial,
}

/// Stores the display's serial number in one of the motor's two
/// paired-display slots.
#[derive(Debug, Clone)]
pub struct DisplayPairing {
    slot: usize,
    field: FieldRef,
    host: u8,
    state: State,
    display_serial: Vec<u8>,
    outcome: Option<WriteOutcome>,
}

impl DisplayPairing {
    /// `slot` is 0 or 1.
    pub fn new(slot: usize, fields: &FieldMap) -> Result<Self> {
        let field = *fields.display_serial_slots.get(slot).ok_or_else(|| {
            SessionError::InvalidProcedure(format!("display slot {} does not exist", slot + 1))
        })?;
        Ok(Self {
            slot,
            field,
            host: device::PC,
            state: State::GetDisplaySerial,
            display_serial: Vec::new(),
            outcome: None,
        })
    }

    pub fn display_serial(&self) -> &[u8] {
        &self.display_serial
    }

    /// Set once the procedure is done.
    pub fn outcome(&self) -> Option<&WriteOutcome> {
        self.outcome.as_ref()
    }

    fn report_stored(&self, stored: &[u8], reporter: &Reporter) {
        reporter.line(format!(
            "Display serial stored in motor slot {}: {}",
            self.slot + 1,
            hex(stored)
        ));
    }

    fn finish(&mut self, outcome: WriteOutcome) -> Step {
        self.outcome = Some(outcome);
        Step::Done
    }
}

impl Procedure for DisplayPairing {
    fn name(&self) -> &'static str {
        "pair-display"
    }

    fn startup_mode(&self) -> StartupMode {
        StartupMode::CheckBat
    }

    fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame> {
        self.host = encoder.source();
        let frame = match self.state {
            State::GetDisplaySerial => encoder.command(device::DISPLAY, command::SERIAL, &[])?,
            State::GetStoredSerial | State::CheckStoredSerial => self.field.read(encoder)?,
            State::PutSerial => self.field.write(encoder, &self.display_serial)?,
        };
        Ok(frame)
    }

    fn handle_response(&mut self, message: &Message, reporter: &Reporter) -> Step {
        let (host, motor) = (self.host, self.field.device);
        let from_motor = |cmd| is_reply(message, host, motor, cmd);

        match self.state {
            State::GetDisplaySerial if is_reply(message, host, device::DISPLAY, command::SERIAL) => {
                self.display_serial = message.payload().to_vec();
                reporter.line(format!("Display serial: {}", hex(&self.display_serial)));
                self.state = State::GetStoredSerial;
                Step::SendCommand
            }
            State::GetStoredSerial if from_motor(command::GET_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    reporter.line(format!(
                        "Reading motor slot {} failed: {}",
                        self.slot + 1,
                        status_name(code)
                    ));
                    return self.finish(WriteOutcome::Rejected { status: code });
                }
                let stored = self.field.value(message.payload());
                self.report_stored(stored, reporter);
                if stored == self.display_serial.as_slice() {
                    reporter.line("Serials already match, no change made");
                    return self.finish(WriteOutcome::Unchanged);
                }
                self.state = State::PutSerial;
                Step::SendCommand
            }
            State::PutSerial if from_motor(command::PUT_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    reporter.line(format!(
                        "Storing display serial failed: {}",
                        status_name(code)
                    ));
                    return self.finish(WriteOutcome::Rejected { status: code });
                }
                reporter.line("New display serial stored in motor!");
                self.state = State::CheckStoredSerial;
                Step::SendCommand
            }
            State::CheckStoredSerial if from_motor(command::GET_DATA) => {
                let stored = self.field.value(message.payload());
                self.report_stored(stored, reporter);
                let verified =
                    status_of(message) == status::OK && stored == self.display_serial.as_slice();
                self.finish(WriteOutcome::Written { verified })
            }
            _ => Step::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::config::SessionConfig;
    use crate::sim::{Bus, ScriptedDevice};

    const SERIAL: [u8; 8] = [0x12, 0x34, 0x00, 0x00, 0x00, 0x00, 0x56, 0x78];

    /// Display answering SERIAL, motor storing one array field.
    fn display_and_motor(slot: FieldRef, stored: Vec<u8>) -> (ScriptedDevice, Rc<RefCell<Vec<u8>>>) {
        let stored = Rc::new(RefCell::new(stored));
        let motor_slot = Rc::clone(&stored);
        let device = ScriptedDevice::new(move |request: &Message| {
            let host = request.source().unwrap();
            if request.target() == device::DISPLAY && request.is_command(command::SERIAL) {
                let display = Encoder::new(device::DISPLAY).unwrap();
                return vec![display.response(host, command::SERIAL, &SERIAL).unwrap()];
            }
            if request.target() != slot.device {
                return Vec::new();
            }
            let motor = Encoder::new(slot.device).unwrap();
            let payload = request.payload();
            if request.is_command(command::GET_DATA) && payload.get(1) == Some(&slot.id) {
                let value = motor_slot.borrow();
                let mut body = vec![status::OK, slot.descriptor, slot.id, value.len() as u8];
                body.extend_from_slice(&value);
                vec![motor.response(host, command::GET_DATA, &body).unwrap()]
            } else if request.is_command(command::PUT_DATA) && payload.get(1) == Some(&slot.id) {
                *motor_slot.borrow_mut() = payload[5..].to_vec();
                vec![motor.response(host, command::PUT_DATA, &[status::OK]).unwrap()]
            } else {
                Vec::new()
            }
        });
        (device, stored)
    }

    fn run(pairing: &mut DisplayPairing, device: ScriptedDevice) -> Vec<String> {
        let bus = Bus::new(device);
        let (reporter, rx) = Reporter::channel(64);
        let config = SessionConfig::default().with_mode(pairing.startup_mode());
        let mut session = bus.session(config).with_reporter(reporter);
        session.run(pairing).unwrap();
        drop(session);
        rx.try_iter()
            .filter(|line| !line.starts_with("Bus silent") && !line.starts_with("No response"))
            .collect()
    }

    #[test]
    fn writes_serial_into_empty_slot() {
        let fields = FieldMap::default();
        let slot = fields.display_serial_slots[1];
        let (device, stored) = display_and_motor(slot, vec![0; 8]);
        let mut pairing = DisplayPairing::new(1, &fields).unwrap();

        let lines = run(&mut pairing, device);
        assert_eq!(*stored.borrow(), SERIAL.to_vec());
        assert_eq!(
            pairing.outcome(),
            Some(&WriteOutcome::Written { verified: true })
        );
        assert_eq!(
            lines,
            vec![
                "Display serial: 1234000000005678",
                "Display serial stored in motor slot 2: 0000000000000000",
                "New display serial stored in motor!",
                "Display serial stored in motor slot 2: 1234000000005678",
            ]
        );
    }

    #[test]
    fn matching_serial_is_left_alone() {
        let fields = FieldMap::default();
        let slot = fields.display_serial_slots[0];
        let (device, _) = display_and_motor(slot, SERIAL.to_vec());
        let mut pairing = DisplayPairing::new(0, &fields).unwrap();

        let lines = run(&mut pairing, device);
        assert_eq!(pairing.outcome(), Some(&WriteOutcome::Unchanged));
        assert_eq!(lines.last().unwrap(), "Serials already match, no change made");
    }

    #[test]
    fn slot_out_of_range_is_rejected() {
        assert!(matches!(
            DisplayPairing::new(2, &FieldMap::default()),
            Err(SessionError::InvalidProcedure(_))
        ));
    }
}
