//! The conversation shown next to the preview.

use facet::Facet;
use sitewright::IdGenerator;

#[derive(Facet, Debug, Clone, Copy, PartialEq, Eq)]
#[facet(rename_all = "snake_case")]
#[repr(u8)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

/// Ordered chat messages with generated ids.
#[derive(Debug, Clone)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    ids: IdGenerator,
}

impl Default for ChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ChatLog {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl ChatLog {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            ids: IdGenerator::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Append a message and return its id.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> String {
        let id = self.ids.next_id(12);
        self.messages.push(ChatMessage {
            id: id.clone(),
            role,
            content: content.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        id
    }

    /// Replace the content of a message. Returns false for unknown ids.
    pub fn set_content(&mut self, id: &str, content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = content.into();
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(index))
    }

    /// Drop every message after `id`. Unknown ids leave the log alone.
    pub fn remove_messages_after(&mut self, id: &str) -> usize {
        match self.messages.iter().position(|m| m.id == id) {
            Some(index) => self.messages.drain(index + 1..).count(),
            None => 0,
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_testhelpers::test;

    #[test]
    fn remove_after_truncates() {
        let mut log = ChatLog::new();
        log.push(Role::User, "a");
        let b = log.push(Role::Assistant, "b");
        log.push(Role::User, "c");
        log.push(Role::Assistant, "d");

        assert_eq!(log.remove_messages_after(&b), 2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().map(|m| m.content.as_str()), Some("b"));
        assert_eq!(log.remove_messages_after("missing"), 0);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn content_can_be_replaced() {
        let mut log = ChatLog::new();
        let id = log.push(Role::Assistant, "Generating your website...");
        assert!(log.set_content(&id, "Done"));
        assert_eq!(log.get(&id).map(|m| m.content.as_str()), Some("Done"));
        assert!(!log.set_content("nope", "x"));
    }
}
