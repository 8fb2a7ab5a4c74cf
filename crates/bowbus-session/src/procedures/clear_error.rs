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
    ShowError,
    ClearError,
    CheckError,
}

/// Resets the battery's stored error state to zero.
#[derive(Debug, Clone)]
pub struct ClearError {
    field: FieldRef,
    host: u8,
    state: State,
    width: usize,
    outcome: Option<WriteOutcome>,
}

impl ClearError {
    pub fn new(fields: &FieldMap) -> Self {
        let field = fields.battery_error;
        Self {
            field,
            host: device::PC,
            state: State::ShowError,
            width: field.flags().element_size(),
            outcome: None,
        }
    }

    pub fn outcome(&self) -> Option<&WriteOutcome> {
        self.outcome.as_ref()
    }

    fn finish(&mut self, outcome: WriteOutcome) -> Step {
        self.outcome = Some(outcome);
        Step::Done
    }
}

impl Procedure for ClearError {
    fn name(&self) -> &'static str {
        "clear-error"
    }

    fn startup_mode(&self) -> StartupMode {
        StartupMode::WakeupBat
    }

    fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame> {
        self.host = encoder.source();
        let frame = match self.state {
            State::ShowError | State::CheckError => self.field.read(encoder)?,
            State::ClearError => self.field.write(encoder, &vec![0u8; self.width])?,
        };
        Ok(frame)
    }

    fn handle_response(&mut self, message: &Message, reporter: &Reporter) -> Step {
        let (host, battery) = (self.host, self.field.device);

        match self.state {
            State::ShowError if is_reply(message, host, battery, command::GET_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    reporter.line(format!("Reading error state failed: {}", status_name(code)));
                    return self.finish(WriteOutcome::Rejected { status: code });
                }
                let value = self.field.value(message.payload());
                reporter.line(format!("Error state stored in battery: {}", hex(value)));
                if !value.is_empty() {
                    self.width = value.len();
                }
                self.state = State::ClearError;
                Step::SendCommand
            }
            State::ClearError if is_reply(message, host, battery, command::PUT_DATA) => {
                let code = status_of(message);
                if code != status::OK {
                    reporter.line(format!("Clearing error state failed: {}", status_name(code)));
                    return self.finish(WriteOutcome::Rejected { status: code });
                }
                reporter.line("Error state set to '0'!");
                self.state = State::CheckError;
                Step::SendCommand
            }
            State::CheckError if is_reply(message, host, battery, command::GET_DATA) => {
                let value = self.field.value(message.payload());
                reporter.line(format!("Error state stored in battery: {}", hex(value)));
                let verified =
                    status_of(message) == status::OK && value.iter().all(|&byte| byte == 0);
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

    fn battery_with_error(field: FieldRef, error: u8) -> (ScriptedDevice, Rc<RefCell<u8>>) {
        let stored = Rc::new(RefCell::new(error));
        let state = Rc::clone(&stored);
        let device = ScriptedDevice::new(move |request: &Message| {
            let payload = request.payload();
            if request.target() != field.device || payload.get(1) != Some(&field.id) {
                return Vec::new();
            }
            let battery = Encoder::new(field.device).unwrap();
            let host = request.source().unwrap();
            if request.is_command(command::GET_DATA) {
                let body = [status::OK, field.descriptor, field.id, *state.borrow()];
                vec![battery.response(host, command::GET_DATA, &body).unwrap()]
            } else if request.is_command(command::PUT_DATA) {
                *state.borrow_mut() = payload[2];
                vec![battery.response(host, command::PUT_DATA, &[status::OK]).unwrap()]
            } else {
                Vec::new()
            }
        });
        (device, stored)
    }

    #[test]
    fn clears_error_after_battery_wakes_up() {
        let fields = FieldMap::default();
        let (device, stored) = battery_with_error(fields.battery_error, 0x2A);
        let bus = Bus::new(device).with_battery();
        let (reporter, rx) = Reporter::channel(64);
        let mut clear = ClearError::new(&fields);
        let config = SessionConfig::default().with_mode(clear.startup_mode());
        let mut session = bus.session(config).with_reporter(reporter);

        session.run(&mut clear).unwrap();
        drop(session);

        assert_eq!(*stored.borrow(), 0);
        assert_eq!(
            clear.outcome(),
            Some(&WriteOutcome::Written { verified: true })
        );
        let lines: Vec<String> = rx
            .try_iter()
            .filter(|line| !line.starts_with("Bus silent"))
            .collect();
        assert_eq!(
            lines,
            vec![
                "Error state stored in battery: 2a",
                "Error state set to '0'!",
                "Error state stored in battery: 00",
            ]
        );
        assert_eq!(
            bus.sent_commands(),
            vec![
                command::WAKE_UP,
                command::GET_DATA,
                command::PUT_DATA,
                command::GET_DATA
            ]
        );
    }

    #[test]
    fn ignores_replies_from_other_devices() {
        let mut clear = ClearError::new(&FieldMap::default());
        clear.build_next_command(&Encoder::default()).unwrap();
        let motor = Encoder::new(device::MOTOR).unwrap();
        let reply = motor
            .response(device::PC, command::GET_DATA, &[status::OK, 0x00, 0x52, 0x01])
            .unwrap()
            .to_message()
            .unwrap();
        assert_eq!(
            clear.handle_response(&reply, &Reporter::silent()),
            Step::Continue
        );
        assert!(clear.outcome().is_none());
    }
}
