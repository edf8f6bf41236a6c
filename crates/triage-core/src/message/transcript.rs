//! The ordered message sequence of one conversation.

use super::model::{Message, MessageId, Sender};

/// Messages in arrival order plus the "assistant is composing" flag.
///
/// Invariant: at most one message has `MessageId::Pending`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
    composing: bool,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a transcript from bootstrap history.
    ///
    /// Pending entries never come from the server; any found are dropped.
    pub fn from_history(history: Vec<Message>) -> Self {
        let messages = history.into_iter().filter(|m| !m.is_pending()).collect();
        Self {
            messages,
            composing: false,
        }
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

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    /// Whether an assistant reply is being composed (thinking indicator or
    /// awaiting the first fragment).
    pub fn is_composing(&self) -> bool {
        self.composing
    }

    pub fn set_composing(&mut self, composing: bool) {
        self.composing = composing;
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn find(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn find_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    pub fn pending(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.pending().is_some()
    }

    /// Appends the optimistic placeholder, replacing any stale one.
    pub fn push_pending(&mut self, message: Message) {
        debug_assert!(message.is_pending());
        self.remove_pending();
        self.messages.push(message);
    }

    /// Keeps the pending placeholder in place under a local identity, so it
    /// reads as an answered message. Returns whether one was present.
    pub fn confirm_pending(&mut self, id: MessageId) -> bool {
        match self.messages.iter_mut().find(|m| m.is_pending()) {
            Some(message) => {
                message.id = id;
                true
            }
            None => false,
        }
    }

    /// Removes the pending placeholder. Returns whether one was present.
    pub fn remove_pending(&mut self) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| !m.is_pending());
        before != self.messages.len()
    }

    /// Removes every entry with the given id. Returns how many were removed.
    pub fn remove_id(&mut self, id: &MessageId) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| &m.id != id);
        before - self.messages.len()
    }

    /// Index of the newest renderable assistant message.
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages
            .iter()
            .rposition(|m| m.sender == Sender::Assistant && m.is_renderable())
    }

    pub fn last_assistant(&self) -> Option<&Message> {
        self.last_assistant_index().map(|i| &self.messages[i])
    }

    /// The newest renderable message of any sender.
    pub fn last_renderable(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.is_renderable())
    }

    /// Renderable messages with their transcript indices.
    pub fn renderable(&self) -> impl Iterator<Item = (usize, &Message)> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_renderable())
    }

    /// Whether any user message follows the given index.
    pub fn has_user_after(&self, index: usize) -> bool {
        self.messages
            .iter()
            .skip(index + 1)
            .any(|m| m.sender == Sender::User)
    }
}
