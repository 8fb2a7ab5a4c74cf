//! In-memory bus with scripted devices, for session and procedure tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;

use bowbus_frame::{
    command, device, Encoder, FrameReader, FrameWriter, FramerEvent, Framer, Message,
    MessageKind, OutgoingFrame, ReaderConfig, WAKE_UP_BYTE,
};

use crate::config::SessionConfig;
use crate::session::Session;

type Respond = Box<dyn FnMut(&Message) -> Vec<OutgoingFrame>>;

/// Answers each frame the host sends with zero or more frames.
pub(crate) struct ScriptedDevice {
    respond: Respond,
}

impl ScriptedDevice {
    pub(crate) fn new(respond: impl FnMut(&Message) -> Vec<OutgoingFrame> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
        }
    }
}

enum Chunk {
    Bytes(Vec<u8>),
    /// One read that times out.
    Gap,
}

struct Inner {
    inbound: VecDeque<Chunk>,
    device: ScriptedDevice,
    battery: bool,
    framer: Framer,
    wake_up_bytes: usize,
    sent: Vec<Message>,
}

impl Inner {
    fn on_host_byte(&mut self, byte: u8) {
        if byte == WAKE_UP_BYTE && self.framer.pending_len() == 0 {
            self.wake_up_bytes += 1;
            if self.battery {
                let battery = encoder(device::BATTERY);
                self.queue(battery.handoff(device::PC).unwrap());
            }
            return;
        }
        for event in self.framer.push(&[byte]) {
            if let FramerEvent::Message(message) = event {
                self.on_host_message(message);
            }
        }
    }

    fn on_host_message(&mut self, message: Message) {
        let wakes_battery = self.battery
            && message.target() == device::BATTERY
            && message.is_request()
            && message.is_command(command::WAKE_UP);
        if wakes_battery {
            let battery = encoder(device::BATTERY);
            self.queue(battery.response(device::PC, command::WAKE_UP, &[]).unwrap());
        } else {
            for frame in (self.device.respond)(&message) {
                self.queue(frame);
            }
        }
        self.sent.push(message);
    }

    fn queue(&mut self, frame: OutgoingFrame) {
        self.inbound.push_back(Chunk::Bytes(frame.to_wire().to_vec()));
    }
}

fn encoder(source: u8) -> Encoder {
    Encoder::new(source).unwrap()
}

/// Shared state behind a simulated reader/writer pair.
#[derive(Clone)]
pub(crate) struct Bus(Rc<RefCell<Inner>>);

impl Bus {
    pub(crate) fn new(device: ScriptedDevice) -> Self {
        Self(Rc::new(RefCell::new(Inner {
            inbound: VecDeque::new(),
            device,
            battery: false,
            framer: Framer::new(),
            wake_up_bytes: 0,
            sent: Vec::new(),
        })))
    }

    /// Add a battery that hands the bus over after a wake-up byte and
    /// answers WAKE UP.
    pub(crate) fn with_battery(self) -> Self {
        self.0.borrow_mut().battery = true;
        self
    }

    /// Bytes waiting on the line before the session starts.
    pub(crate) fn queue_inbound(&self, bytes: &[u8]) {
        self.0
            .borrow_mut()
            .inbound
            .push_back(Chunk::Bytes(bytes.to_vec()));
    }

    /// A frame that arrives right after the flush read times out.
    pub(crate) fn queue_after_flush(&self, frame: OutgoingFrame) {
        self.queue_after_flush_raw(&frame.to_wire());
    }

    pub(crate) fn queue_after_flush_raw(&self, bytes: &[u8]) {
        let mut inner = self.0.borrow_mut();
        inner.inbound.push_back(Chunk::Gap);
        inner.inbound.push_back(Chunk::Bytes(bytes.to_vec()));
    }

    pub(crate) fn session(&self, config: SessionConfig) -> Session<BusReader, BusWriter> {
        let reader = FrameReader::with_config(
            BusReader(self.clone()),
            ReaderConfig {
                chunk_size: config.read_chunk,
                read_timeout: None,
            },
        );
        let writer = FrameWriter::new(BusWriter(self.clone()));
        Session::new(reader, writer, config).unwrap()
    }

    pub(crate) fn wake_up_bytes(&self) -> usize {
        self.0.borrow().wake_up_bytes
    }

    /// Everything the host sent, as messages.
    pub(crate) fn sent(&self) -> Vec<Message> {
        self.0.borrow().sent.clone()
    }

    /// Command bytes of the requests the host sent.
    pub(crate) fn sent_commands(&self) -> Vec<u8> {
        self.sent()
            .iter()
            .filter(|message| message.is_request())
            .filter_map(Message::command)
            .collect()
    }

    pub(crate) fn pongs_sent_to(&self) -> Vec<u8> {
        self.sent()
            .iter()
            .filter(|message| message.kind() == MessageKind::Pong)
            .map(Message::target)
            .collect()
    }
}

pub(crate) struct BusReader(Bus);

impl Read for BusReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.0 .0.borrow_mut();
        match inner.inbound.pop_front() {
            Some(Chunk::Bytes(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    inner
                        .inbound
                        .push_front(Chunk::Bytes(bytes[n..].to_vec()));
                }
                Ok(n)
            }
            Some(Chunk::Gap) | None => Err(io::Error::from(ErrorKind::TimedOut)),
        }
    }
}

pub(crate) struct BusWriter(Bus);

impl Write for BusWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.0 .0.borrow_mut();
        for &byte in buf {
            inner.on_host_byte(byte);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
