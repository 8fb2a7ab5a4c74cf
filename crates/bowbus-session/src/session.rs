use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bowbus_codec::hex;
use bowbus_frame::{
    command, crc8, device, Encoder, FrameReader, FrameWriter, FramerEvent, Message, ReadOutcome,
};
use tracing::{debug, info, warn};

use crate::config::{SessionConfig, StartupMode};
use crate::error::{Result, SessionError};
use crate::log::MessageLog;
use crate::procedure::{Procedure, Step};
use crate::report::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Drop whatever is on the line until a read times out.
    Flush,
    /// Answer pings and wake the battery until it is ready.
    WaitForDevice,
    SendCommand,
    WaitResponse,
    Done,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    /// Every message received, oldest first (bounded by the log capacity).
    pub messages: Vec<Message>,
    /// Frames sent, wake-up bytes not included.
    pub commands_sent: usize,
}

/// Drives one [`Procedure`] over an exclusively owned bus connection.
///
/// The loop blocks only in reads; every read timeout is a tick that either
/// retries the pending command or advances the wake-up sequence.
pub struct Session<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
    encoder: Encoder,
    config: SessionConfig,
    reporter: Reporter,
    cancel: Arc<AtomicBool>,
    log: MessageLog,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(reader: FrameReader<R>, writer: FrameWriter<W>, config: SessionConfig) -> Result<Self> {
        let encoder = Encoder::new(config.source)?;
        let log = MessageLog::new(config.log_capacity);
        Ok(Self {
            reader,
            writer,
            encoder,
            config,
            reporter: Reporter::silent(),
            cancel: Arc::new(AtomicBool::new(false)),
            log,
        })
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Share a cancellation flag; setting it ends the loop at its next read.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Run `procedure` to completion.
    pub fn run<P: Procedure + ?Sized>(&mut self, procedure: &mut P) -> Result<SessionOutcome> {
        info!(
            procedure = procedure.name(),
            mode = %self.config.mode,
            "session started"
        );
        let mut state = State::Flush;
        let mut waited = 0u32;
        let mut commands_sent = 0usize;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                info!(procedure = procedure.name(), "session cancelled");
                return Err(SessionError::Cancelled);
            }

            match state {
                State::Done => break,
                State::SendCommand => {
                    let frame = procedure.build_next_command(&self.encoder)?;
                    debug!(raw = %hex(frame.raw()), "sending command");
                    self.writer.send(&frame)?;
                    commands_sent += 1;
                    state = State::WaitResponse;
                    continue;
                }
                State::Flush => {
                    if self.reader.discard()? == 0 {
                        state = match self.config.mode {
                            StartupMode::Direct => State::SendCommand,
                            StartupMode::WakeupBat | StartupMode::CheckBat => State::WaitForDevice,
                        };
                        debug!(?state, "line flushed");
                    }
                    continue;
                }
                State::WaitForDevice | State::WaitResponse => {}
            }

            match self.reader.poll()? {
                ReadOutcome::Idle => state = self.on_idle(state, &mut waited)?,
                ReadOutcome::Data(_) => {
                    while state != State::Done {
                        let Some(event) = self.reader.next_event() else {
                            break;
                        };
                        state = self.on_event(state, event, procedure)?;
                    }
                }
            }
        }

        info!(
            procedure = procedure.name(),
            commands_sent,
            received = self.log.len(),
            "session finished"
        );
        Ok(SessionOutcome {
            messages: self.log.drain(),
            commands_sent,
        })
    }

    fn on_idle(&mut self, state: State, waited: &mut u32) -> Result<State> {
        match state {
            State::WaitResponse => {
                debug!("response timed out, resending");
                Ok(State::SendCommand)
            }
            State::WaitForDevice => {
                *waited += 1;
                if let Some(limit) = self.config.wakeup_limit {
                    if *waited >= limit {
                        return Err(SessionError::DeviceTimeout { timeouts: *waited });
                    }
                }
                if *waited % self.config.wake_interval.max(1) == 0 {
                    if self.config.mode == StartupMode::CheckBat
                        && *waited >= self.config.check_bat_give_up
                    {
                        info!(timeouts = *waited, "battery silent, giving up");
                        self.reporter
                            .line("No response from battery, assuming not present.");
                        return Ok(State::SendCommand);
                    }
                    info!(timeouts = *waited, "sending wake up byte");
                    self.reporter.line("Bus silent, sending wake up byte.");
                    self.writer.send_wake_up_byte()?;
                }
                Ok(State::WaitForDevice)
            }
            other => Ok(other),
        }
    }

    fn on_event<P: Procedure + ?Sized>(
        &mut self,
        state: State,
        event: FramerEvent,
        procedure: &mut P,
    ) -> Result<State> {
        let message = match event {
            FramerEvent::Incomplete(bytes) => {
                let crc = crc8(&bytes[..bytes.len().saturating_sub(1)]);
                warn!(raw = %hex(&bytes), "incomplete frame");
                self.reporter
                    .line(format!("Incomplete: {}, crc:{}", hex(&bytes), hex(&[crc])));
                return Ok(state);
            }
            FramerEvent::Message(message) => message,
        };
        self.log.push(message.clone());

        match state {
            State::WaitForDevice if message.target() == self.encoder.source() => {
                self.on_device_message(&message)
            }
            State::WaitResponse => Ok(match procedure.handle_response(&message, &self.reporter) {
                Step::Continue => State::WaitResponse,
                Step::SendCommand => State::SendCommand,
                Step::Done => State::Done,
            }),
            other => Ok(other),
        }
    }

    /// Traffic addressed to us while the battery is waking up.
    fn on_device_message(&mut self, message: &Message) -> Result<State> {
        if message.is_ping_or_pong() {
            if let Some(source) = message.source() {
                debug!(to = source, "answering ping");
                self.writer.send(&self.encoder.pong(source)?)?;
            }
        } else if message.is_handoff() {
            debug!("bus handed to us, waking battery");
            self.writer.send(&self.encoder.wake_up(device::BATTERY)?)?;
        } else if message.is_response()
            && message.source() == Some(device::BATTERY)
            && message.is_command(command::WAKE_UP)
        {
            info!("battery awake");
            return Ok(State::SendCommand);
        }
        Ok(State::WaitForDevice)
    }
}

#[cfg(test)]
mod tests {
    use bowbus_frame::{command, Encoder, OutgoingFrame};

    use super::*;
    use crate::sim::{Bus, ScriptedDevice};

    /// Reads one field from the motor and stops at the first answer.
    struct ReadOnce {
        mode: StartupMode,
        answered: bool,
    }

    impl Procedure for ReadOnce {
        fn name(&self) -> &'static str {
            "read-once"
        }

        fn startup_mode(&self) -> StartupMode {
            self.mode
        }

        fn build_next_command(&mut self, encoder: &Encoder) -> Result<OutgoingFrame> {
            Ok(encoder.get_data(device::MOTOR, 0x04, 0x10)?)
        }

        fn handle_response(&mut self, message: &Message, _reporter: &Reporter) -> Step {
            if message.is_response() && message.is_command(command::GET_DATA) {
                self.answered = true;
                Step::Done
            } else {
                Step::Continue
            }
        }
    }

    fn read_once(mode: StartupMode) -> ReadOnce {
        ReadOnce {
            mode,
            answered: false,
        }
    }

    fn motor_answering_reads() -> ScriptedDevice {
        ScriptedDevice::new(|request: &Message| {
            if request.target() == device::MOTOR && request.is_command(command::GET_DATA) {
                let motor = Encoder::new(device::MOTOR).unwrap();
                vec![motor
                    .response(device::PC, command::GET_DATA, &[0x00, 0x04, 0x10, 0x01, 0x2C])
                    .unwrap()]
            } else {
                Vec::new()
            }
        })
    }

    #[test]
    fn direct_mode_flushes_then_sends() {
        let bus = Bus::new(motor_answering_reads());
        bus.queue_inbound(&[0xAA, 0xBB, 0xCC]);
        let mut session = bus.session(SessionConfig::default());
        let mut procedure = read_once(StartupMode::Direct);

        let outcome = session.run(&mut procedure).unwrap();
        assert!(procedure.answered);
        assert_eq!(outcome.commands_sent, 1);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.messages[0].is_response());
        assert_eq!(bus.wake_up_bytes(), 0);
    }

    #[test]
    fn response_timeout_resends_command() {
        let mut dropped = 2;
        let device = ScriptedDevice::new(move |request: &Message| {
            if dropped > 0 {
                dropped -= 1;
                return Vec::new();
            }
            let motor = Encoder::new(device::MOTOR).unwrap();
            vec![motor
                .response(request.source().unwrap(), command::GET_DATA, &[0x01])
                .unwrap()]
        });
        let bus = Bus::new(device);
        let mut session = bus.session(SessionConfig::default());
        let outcome = session.run(&mut read_once(StartupMode::Direct)).unwrap();
        assert_eq!(outcome.commands_sent, 3);
    }

    #[test]
    fn check_bat_gives_up_on_silent_battery() {
        let bus = Bus::new(motor_answering_reads());
        let (reporter, rx) = Reporter::channel(64);
        let config = SessionConfig::default().with_mode(StartupMode::CheckBat);
        let mut session = bus.session(config).with_reporter(reporter);

        let outcome = session.run(&mut read_once(StartupMode::CheckBat)).unwrap();
        assert_eq!(outcome.commands_sent, 1);
        // timeouts 5, 10 and 15 send a wake-up byte, 20 gives up
        assert_eq!(bus.wake_up_bytes(), 3);
        drop(session);
        let lines: Vec<String> = rx.try_iter().collect();
        assert_eq!(
            lines,
            vec![
                "Bus silent, sending wake up byte.",
                "Bus silent, sending wake up byte.",
                "Bus silent, sending wake up byte.",
                "No response from battery, assuming not present.",
            ]
        );
    }

    #[test]
    fn wakeup_bat_follows_battery_handshake() {
        let bus = Bus::new(motor_answering_reads()).with_battery();
        let config = SessionConfig::default().with_mode(StartupMode::WakeupBat);
        let mut session = bus.session(config);
        let outcome = session.run(&mut read_once(StartupMode::WakeupBat)).unwrap();

        assert_eq!(bus.wake_up_bytes(), 1);
        let kinds: Vec<bool> = outcome.messages.iter().map(Message::is_handoff).collect();
        assert_eq!(kinds, vec![true, false, false]);
        assert!(outcome.messages[1].is_command(command::WAKE_UP));
        // wake-up to the battery, then the procedure's read
        assert_eq!(outcome.commands_sent, 1);
        assert_eq!(bus.sent_commands(), vec![command::WAKE_UP, command::GET_DATA]);
    }

    #[test]
    fn pings_are_answered_while_waiting() {
        let bus = Bus::new(motor_answering_reads()).with_battery();
        let display = Encoder::new(device::DISPLAY).unwrap();
        bus.queue_after_flush(display.ping(device::PC).unwrap());
        let config = SessionConfig::default().with_mode(StartupMode::WakeupBat);
        let mut session = bus.session(config);
        session.run(&mut read_once(StartupMode::WakeupBat)).unwrap();
        assert_eq!(bus.pongs_sent_to(), vec![device::DISPLAY]);
    }

    #[test]
    fn wakeup_limit_fails_with_device_timeout() {
        let bus = Bus::new(motor_answering_reads());
        let mut config = SessionConfig::default().with_mode(StartupMode::WakeupBat);
        config.wakeup_limit = Some(7);
        let mut session = bus.session(config);
        let err = session
            .run(&mut read_once(StartupMode::WakeupBat))
            .unwrap_err();
        assert!(matches!(err, SessionError::DeviceTimeout { timeouts: 7 }));
    }

    #[test]
    fn cancelled_session_stops() {
        let bus = Bus::new(motor_answering_reads());
        let mut session = bus.session(SessionConfig::default());
        session.cancel_handle().store(true, Ordering::Relaxed);
        let err = session.run(&mut read_once(StartupMode::Direct)).unwrap_err();
        assert!(matches!(err, SessionError::Cancelled));
        assert!(bus.sent_commands().is_empty());
    }

    #[test]
    fn incomplete_frames_are_reported_not_fatal() {
        let bus = Bus::new(motor_answering_reads());
        bus.queue_after_flush_raw(&[0x10, 0x01, 0x42, 0x08]);
        let (reporter, rx) = Reporter::channel(8);
        let config = SessionConfig::default().with_mode(StartupMode::CheckBat);
        let mut session = bus.session(config).with_reporter(reporter);
        session.run(&mut read_once(StartupMode::CheckBat)).unwrap();
        drop(session);
        assert!(rx
            .try_iter()
            .any(|line| line.starts_with("Incomplete: 10014208, crc:")));
    }
}
