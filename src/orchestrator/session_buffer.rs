//! Session Buffer (spec component A): a bounded rolling window of
//! `(role, text)` messages that feeds the `session_summary` inner task.

use serde::{Deserialize, Serialize};

/// Maximum number of turns retained before the oldest are dropped.
pub const MAX_MESSAGES: usize = 40;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionBuffer {
    messages: Vec<(String, String)>,
}

impl SessionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: &str, text: &str) {
        self.messages.push((role.to_string(), text.to_string()));
        if self.messages.len() > MAX_MESSAGES {
            let overflow = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(0..overflow);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[(String, String)] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<(String, String)> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_clear() {
        let mut buf = SessionBuffer::new();
        assert!(buf.is_empty());
        buf.push("user", "hi");
        buf.push("assistant", "hello");
        assert_eq!(buf.messages().len(), 2);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn drops_oldest_past_capacity() {
        let mut buf = SessionBuffer::new();
        for i in 0..(MAX_MESSAGES + 5) {
            buf.push("user", &format!("msg-{i}"));
        }
        assert_eq!(buf.messages().len(), MAX_MESSAGES);
        assert_eq!(buf.messages()[0].1, "msg-5");
    }
}
