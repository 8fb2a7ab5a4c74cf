use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::message::{declared_size, Message, MessageKind, START_BYTE};

const INITIAL_BUFFER_CAPACITY: usize = 32;

/// Output of the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// A frame reached its declared size.
    Message(Message),
    /// A start byte interrupted a frame in progress; these are the bytes
    /// collected so far (start byte first).
    Incomplete(Bytes),
}

/// Byte-at-a-time frame assembler.
///
/// Undoes the start-byte stuffing and cuts the stream into messages using
/// the sizes implied by each header. Each instance tracks one stream.
#[derive(Debug)]
pub struct Framer {
    escaping: bool,
    count: usize,
    kind: MessageKind,
    target: u8,
    source: Option<u8>,
    declared_size: usize,
    buf: BytesMut,
    last: Option<Arc<Message>>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            escaping: false,
            count: 0,
            kind: MessageKind::Handoff,
            target: 0,
            source: None,
            declared_size: 0,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            last: None,
        }
    }

    /// Feed one wire byte, reporting completed or interrupted frames to `on_event`.
    pub fn feed<F>(&mut self, byte: u8, mut on_event: F)
    where
        F: FnMut(FramerEvent),
    {
        if self.escaping {
            self.escaping = false;
            if byte == START_BYTE {
                // doubled start byte: literal 0x10
                self.assemble(START_BYTE, &mut on_event);
            } else {
                if self.count != 0 {
                    let partial = self.buf.split().freeze();
                    trace!(len = partial.len(), "frame interrupted by start byte");
                    on_event(FramerEvent::Incomplete(partial));
                }
                self.reset_frame();
                self.assemble(START_BYTE, &mut on_event);
                self.assemble(byte, &mut on_event);
            }
        } else if byte == START_BYTE {
            self.escaping = true;
        } else {
            self.assemble(byte, &mut on_event);
        }
    }

    /// Feed a run of wire bytes.
    pub fn feed_slice<F>(&mut self, bytes: &[u8], mut on_event: F)
    where
        F: FnMut(FramerEvent),
    {
        for &byte in bytes {
            self.feed(byte, &mut on_event);
        }
    }

    /// Feed a run of wire bytes and collect the resulting events.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<FramerEvent> {
        let mut events = Vec::new();
        self.feed_slice(bytes, |event| events.push(event));
        events
    }

    /// The most recently completed message.
    pub fn last(&self) -> Option<&Message> {
        self.last.as_deref()
    }

    /// Number of bytes collected for the frame in progress.
    pub fn pending_len(&self) -> usize {
        self.count
    }

    /// Drop any partial frame, pending escape and message history.
    pub fn reset(&mut self) {
        self.escaping = false;
        self.reset_frame();
        self.last = None;
    }

    fn reset_frame(&mut self) {
        self.count = 0;
        self.kind = MessageKind::Handoff;
        self.target = 0;
        self.source = None;
        self.declared_size = 0;
        self.buf.clear();
    }

    fn assemble<F>(&mut self, value: u8, on_event: &mut F)
    where
        F: FnMut(FramerEvent),
    {
        match self.count {
            0 => {
                // a lone zero between frames is the battery wake pulse
                if value == 0x00 {
                    return;
                }
                self.buf.clear();
                self.source = None;
            }
            1 => {
                self.target = value >> 4;
                self.kind = MessageKind::from_nibble(value);
            }
            2 => {
                if self.kind == MessageKind::Handoff {
                    self.declared_size = declared_size(self.kind, value);
                } else {
                    self.source = Some(value >> 4);
                    self.declared_size = declared_size(self.kind, value);
                }
            }
            _ => {}
        }

        self.buf.put_u8(value);
        self.count += 1;

        if self.count > 2 && self.count == self.declared_size {
            let raw = self.buf.split().freeze();
            let message = Message::new(
                self.kind,
                self.target,
                self.source,
                self.declared_size,
                raw,
            )
            .with_previous(self.last.take());
            self.last = Some(Arc::new(message.detached()));
            self.count = 0;
            on_event(FramerEvent::Message(message));
        }
    }
}
