use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

/// Start-of-frame marker; doubled when it occurs inside a frame.
pub const START_BYTE: u8 = 0x10;

/// Message kind, carried in the low nibble of the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Bus control passes to the target. No source, no payload.
    Handoff,
    Request,
    Response,
    Pong,
    Ping,
    /// Any other nibble value; sized like a request.
    Unknown(u8),
}

impl MessageKind {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0 => Self::Handoff,
            1 => Self::Request,
            2 => Self::Response,
            3 => Self::Pong,
            4 => Self::Ping,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Handoff => 0,
            Self::Request => 1,
            Self::Response => 2,
            Self::Pong => 3,
            Self::Ping => 4,
            Self::Unknown(code) => code,
        }
    }

    /// True for kinds that carry a command byte and payload.
    pub fn has_command(self) -> bool {
        !matches!(self, Self::Handoff | Self::Pong | Self::Ping)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handoff => f.write_str("HANDOFF"),
            Self::Request => f.write_str("REQ"),
            Self::Response => f.write_str("RSP"),
            Self::Pong => f.write_str("PONG"),
            Self::Ping => f.write_str("PING"),
            Self::Unknown(code) => write!(f, "TYPE{code:x}"),
        }
    }
}

/// Total frame length (start byte through checksum) implied by the header.
///
/// `hdr2` is ignored for handoffs, which have no second header byte.
pub fn declared_size(kind: MessageKind, hdr2: u8) -> usize {
    match kind {
        MessageKind::Handoff => 3,
        MessageKind::Ping | MessageKind::Pong => 4,
        _ => usize::from(hdr2 & 0x0F) + 5,
    }
}

/// One complete bus message.
///
/// `raw` is the unescaped frame: start byte, header, command and payload,
/// checksum. Messages are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    kind: MessageKind,
    target: u8,
    source: Option<u8>,
    declared_size: usize,
    raw: Bytes,
    previous: Option<Arc<Message>>,
}

impl Message {
    pub fn new(
        kind: MessageKind,
        target: u8,
        source: Option<u8>,
        declared_size: usize,
        raw: impl Into<Bytes>,
    ) -> Self {
        Self {
            kind,
            target,
            source,
            declared_size,
            raw: raw.into(),
            previous: None,
        }
    }

    /// Interpret an unescaped frame, deriving kind, ids and size from its header.
    ///
    /// Returns `None` when the frame is too short to carry its header.
    pub fn from_frame(raw: impl Into<Bytes>) -> Option<Self> {
        let raw = raw.into();
        let hdr1 = *raw.get(1)?;
        let kind = MessageKind::from_nibble(hdr1);
        let (source, size) = if kind == MessageKind::Handoff {
            (None, declared_size(kind, 0))
        } else {
            let hdr2 = *raw.get(2)?;
            (Some(hdr2 >> 4), declared_size(kind, hdr2))
        };
        Some(Self::new(kind, hdr1 >> 4, source, size, raw))
    }

    /// Link this message to the one completed before it.
    ///
    /// The link is one level deep: the linked message never carries a
    /// link of its own.
    pub fn with_previous(mut self, previous: Option<Arc<Message>>) -> Self {
        self.previous = previous.map(|prev| {
            if prev.previous.is_some() {
                Arc::new(prev.detached())
            } else {
                prev
            }
        });
        self
    }

    /// Copy of this message without its link.
    pub fn detached(&self) -> Self {
        Self {
            previous: None,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    /// Source device; `None` for handoffs.
    pub fn source(&self) -> Option<u8> {
        self.source
    }

    pub fn declared_size(&self) -> usize {
        self.declared_size
    }

    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// The message completed immediately before this one, if known.
    pub fn previous(&self) -> Option<&Message> {
        self.previous.as_deref()
    }

    /// Command byte of a request or response.
    pub fn command(&self) -> Option<u8> {
        if self.kind.has_command() {
            self.raw.get(3).copied()
        } else {
            None
        }
    }

    /// Payload bytes between the command byte and the checksum.
    pub fn payload(&self) -> &[u8] {
        if self.kind.has_command() && self.raw.len() > 4 {
            &self.raw[4..self.raw.len() - 1]
        } else {
            &[]
        }
    }

    /// Trailing checksum byte as received.
    pub fn checksum(&self) -> Option<u8> {
        self.raw.last().copied()
    }

    pub fn is_handoff(&self) -> bool {
        self.kind == MessageKind::Handoff
    }

    pub fn is_ping_or_pong(&self) -> bool {
        matches!(self.kind, MessageKind::Ping | MessageKind::Pong)
    }

    pub fn is_request(&self) -> bool {
        self.kind == MessageKind::Request
    }

    pub fn is_response(&self) -> bool {
        self.kind == MessageKind::Response
    }

    pub fn is_command(&self, command: u8) -> bool {
        self.command() == Some(command)
    }
}
