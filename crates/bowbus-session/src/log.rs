use std::collections::VecDeque;

use bowbus_frame::Message;

/// Bounded log of received messages; the oldest entry goes first when full.
#[derive(Debug, Clone)]
pub struct MessageLog {
    entries: VecDeque<Message>,
    capacity: usize,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: Message) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    /// Move all entries out, oldest first.
    pub fn drain(&mut self) -> Vec<Message> {
        self.entries.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use bowbus_frame::{device, Encoder};

    use super::*;

    fn ping(target: u8) -> Message {
        Encoder::default().ping(target).unwrap().to_message().unwrap()
    }

    #[test]
    fn evicts_oldest_first() {
        let mut log = MessageLog::new(2);
        log.push(ping(device::MOTOR));
        log.push(ping(device::BATTERY));
        log.push(ping(device::DISPLAY));
        assert_eq!(log.len(), 2);
        let targets: Vec<u8> = log.iter().map(Message::target).collect();
        assert_eq!(targets, vec![device::BATTERY, device::DISPLAY]);
    }

    #[test]
    fn drain_empties_the_log() {
        let mut log = MessageLog::new(0);
        assert_eq!(log.capacity(), 1);
        log.push(ping(device::MOTOR));
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }
}
