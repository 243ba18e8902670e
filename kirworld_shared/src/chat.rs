//! Chat log.
//!
//! Messages are kept in arrival order and never mutated once stored. The
//! log holds at most `capacity` entries; pushing past that evicts the oldest.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::net::{ChatBroadcast, EntityId, MAX_CHAT_LEN};

/// Default number of retained messages.
pub const DEFAULT_CHAT_CAPACITY: usize = 100;

/// A received chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender's entity id.
    pub sender_id: EntityId,
    /// Sender's display name at send time.
    pub sender_name: String,
    /// Message content.
    pub text: String,
    /// Local arrival time.
    pub received_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(sender_id: EntityId, sender_name: &str, text: &str) -> Self {
        ChatMessage {
            sender_id,
            sender_name: sender_name.to_string(),
            text: text.to_string(),
            received_at: Utc::now(),
        }
    }

    /// True when the message was sent by `local`.
    pub fn is_from(&self, local: Option<&EntityId>) -> bool {
        local.is_some_and(|id| *id == self.sender_id)
    }
}

/// Text is cut at `MAX_CHAT_LEN` characters; broadcasts that skipped
/// `decode` are never stored unbounded.
impl From<ChatBroadcast> for ChatMessage {
    fn from(b: ChatBroadcast) -> Self {
        let text = if b.text.chars().count() > MAX_CHAT_LEN {
            b.text.chars().take(MAX_CHAT_LEN).collect()
        } else {
            b.text
        };
        ChatMessage {
            sender_id: b.id,
            sender_name: b.name,
            text,
            received_at: Utc::now(),
        }
    }
}

/// Capped, arrival-ordered message log.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl ChatLog {
    pub fn new(capacity: usize) -> Self {
        ChatLog {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a message, evicting from the front until within capacity.
    pub fn push(&mut self, msg: ChatMessage) {
        self.messages.push_back(msg);
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    /// Most recent `count` messages, oldest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ChatMessage> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip)
    }
}

impl Default for ChatLog {
    fn default() -> Self {
        ChatLog::new(DEFAULT_CHAT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(i: usize) -> ChatMessage {
        ChatMessage::new(EntityId::new("p1"), "Ann", &format!("Message {}", i))
    }

    #[test]
    fn broadcast_text_bounded_on_conversion() {
        let b = ChatBroadcast {
            id: EntityId::new("p2"),
            name: "Bo".into(),
            text: "é".repeat(MAX_CHAT_LEN * 3),
        };
        let m = ChatMessage::from(b);
        assert_eq!(m.text.chars().count(), MAX_CHAT_LEN);
        assert_eq!(m.sender_id.as_str(), "p2");
    }

    #[test]
    fn log_keeps_arrival_order() {
        let mut log = ChatLog::new(5);
        for i in 0..3 {
            log.push(msg(i));
        }
        let texts: Vec<_> = log.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["Message 0", "Message 1", "Message 2"]);
    }

    #[test]
    fn log_evicts_oldest_past_capacity() {
        let mut log = ChatLog::new(DEFAULT_CHAT_CAPACITY);
        for i in 0..=DEFAULT_CHAT_CAPACITY {
            log.push(msg(i));
        }
        assert_eq!(log.len(), DEFAULT_CHAT_CAPACITY);
        assert_eq!(log.iter().next().unwrap().text, "Message 1");
        assert_eq!(
            log.latest().unwrap().text,
            format!("Message {}", DEFAULT_CHAT_CAPACITY)
        );
        let ordered = log
            .iter()
            .zip(log.iter().skip(1))
            .all(|(a, b)| a.received_at <= b.received_at);
        assert!(ordered);
    }

    #[test]
    fn recent_returns_tail() {
        let mut log = ChatLog::new(10);
        for i in 0..6 {
            log.push(msg(i));
        }
        let tail: Vec<_> = log.recent(2).map(|m| m.text.clone()).collect();
        assert_eq!(tail, ["Message 4", "Message 5"]);
        assert_eq!(log.recent(50).count(), 6);
    }

    #[test]
    fn ownership_check() {
        let m = msg(0);
        assert!(m.is_from(Some(&EntityId::new("p1"))));
        assert!(!m.is_from(Some(&EntityId::new("p2"))));
        assert!(!m.is_from(None));
    }
}
