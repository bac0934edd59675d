//! Conversation history types
//!
//! A transcript is append-only. Messages are never edited or removed and
//! their `sequence` numbers are strictly increasing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Role::System),
            "user" => Some(Role::User),
            "assistant" => Some(Role::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub sequence: u64,
}

/// Ordered conversation history for one subject
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from loaded messages. Messages are sorted by sequence in case
    /// the backing store handed them over unordered.
    pub fn from_messages(mut messages: Vec<Message>) -> Self {
        messages.sort_by_key(|m| m.sequence);
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Sequence number the next appended message will carry
    pub fn next_sequence(&self) -> u64 {
        self.messages.last().map_or(0, |m| m.sequence + 1)
    }

    /// Append a message, assigning it the next sequence number
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let sequence = self.next_sequence();
        self.messages.push(Message {
            role,
            content: content.into(),
            sequence,
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Messages shown to the user: everything except the leading system
    /// message, which only configures the assistant.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    /// The last message, if it came from the user with no reply after it
    pub fn unanswered(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == Role::User)
    }
}
