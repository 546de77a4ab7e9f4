//! Conversation data model.
//!
//! A transcript is the ordered list of messages exchanged in one
//! conversation. Messages are immutable once appended and render
//! top-to-bottom in insertion order.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum Author {
    User,
    Bot,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User => write!(f, "You"),
            Author::Bot => write!(f, "Bot"),
        }
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Message {
    pub(crate) text: String,
    pub(crate) author: Author,
}

impl Message {
    pub(crate) fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: Author::User,
        }
    }

    pub(crate) fn bot(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: Author::Bot,
        }
    }
}

/// An ordered conversation. Exactly one slot (the active view or one
/// history slot) owns a given transcript; loading from history copies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn len(&self) -> usize {
        self.messages.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub(crate) fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

impl FromIterator<Message> for Transcript {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_display() {
        assert_eq!(format!("{}", Author::User), "You");
        assert_eq!(format!("{}", Author::Bot), "Bot");
    }

    #[test]
    fn test_transcript_preserves_insertion_order() {
        let mut transcript = Transcript::new();
        transcript.push(Message::user("hello"));
        transcript.push(Message::bot("hi there"));

        let texts: Vec<&str> = transcript.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi there"]);
    }

    #[test]
    fn test_transcript_serde_round_trip() {
        let transcript: Transcript =
            [Message::user("ping"), Message::bot("pong")].into_iter().collect();

        let json = serde_json::to_string(&transcript).expect("Failed to serialize");
        let restored: Transcript = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(restored, transcript);
    }
}
