use bowbus_codec::hex;
use bowbus_frame::command::{self, status};
use bowbus_frame::{device, Encoder, Message, OutgoingFrame};

use super::{is_reply, status_name, status_of};
use crate::config::{FieldMap, FieldRef, StartupMode};
use crate::error::Result;
use crate::procedure::{Procedure, Step, WriteOutcome};
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    GetMotorSerial,
    GetStoredSerial,
    PutSerial,
    CheckStoredSerial,
}

/// Stores the motor's serial number in the battery's paired-motor slot.
#[derive(Debug, Clone)]
pub struct BatteryPairing {
    motor_serial_field: FieldRef,
    slot: FieldRef,
    host: u8,
    state: State,
    motor_serial: Vec<u8>,
    outcome: Option<WriteOutcome>,
}

impl BatteryPairing {
    pub fn new(fields: &FieldMap) -> Self {
        Self {
            motor_serial_field: fields.motor_serial,
            slot: fields.battery_motor_serial,
            host: device::PC,
            state: State::GetMotorSerial,
            motor_serial: Vec::new(),
            outcome: None,
        }
    }

    pub fn motor_serial(&self) -> &[u8] {
        &self.motor_serial
    }

    pub fn outcome(&self) -> Option<&WriteOutcome> {
        self.outcome.as_ref()
    }

    fn finish(&mut self, outcome: WriteOutcome) -> Step {
        self.outcome = Some(outcome);
        Step::Done
    }

    fn rejected(&mut self, what: &str, code: u8, reporter: &Reporter) -> Step {
        reporter.line(format!("{what} failed: {}", status_name(code)));
        self.finish(WriteOutcome::Rejected { status: code })
    }
}

impl Procedure for BatteryPairing {
    fn name(&self) -> &'static str {
        "pair-battery"
    }

    fn startup_mode(&self) -> StartupMode {
        StartupMode::CheckBat
    }

    fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame> {
        self.host = encoder.source();
        let frame = match self.state {
            State::GetMotorSerial => self.motor_serial_field.read(encoder)?,
            State::GetStoredSerial | State::CheckStoredSerial => self.slot.read(encoder)?,
            State::PutSerial => self.slot.write(encoder, &self.motor_serial)?,
        };
        Ok(frame)
    }

    fn handle_response(&mut self, message: &Message, reporter: &Reporter) -> Step {
        let host = self.host;
        let motor = self.motor_serial_field.device;
        let battery = self.slot.device;

        match self.state {
            State::GetMotorSerial if is_reply(message, host, motor, command::GET_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    return self.rejected("Reading motor serial", code, reporter);
                }
                self.motor_serial = self.motor_serial_field.value(message.payload()).to_vec();
                reporter.line(format!("Motor serial: {}", hex(&self.motor_serial)));
                self.state = State::GetStoredSerial;
                Step::SendCommand
            }
            State::GetStoredSerial if is_reply(message, host, battery, command::GET_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    return self.rejected("Reading battery slot", code, reporter);
                }
                let stored = self.slot.value(message.payload());
                reporter.line(format!("Motor serial stored in battery: {}", hex(stored)));
                if stored == self.motor_serial.as_slice() {
                    reporter.line("Serials already match, no change made");
                    return self.finish(WriteOutcome::Unchanged);
                }
                self.state = State::PutSerial;
                Step::SendCommand
            }
            State::PutSerial if is_reply(message, host, battery, command::PUT_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    return self.rejected("Storing motor serial", code, reporter);
                }
                reporter.line("New motor serial stored in battery!");
                self.state = State::CheckStoredSerial;
                Step::SendCommand
            }
            State::CheckStoredSerial if is_reply(message, host, battery, command::GET_DATA) => {
                let stored = self.slot.value(message.payload());
                reporter.line(format!("Motor serial stored in battery: {}", hex(stored)));
                let verified =
                    status_of(message) == status::OK && stored == self.motor_serial.as_slice();
                self.finish(WriteOutcome::Written { verified })
            }
            _ => Step::Continue,
        }
    }
}
