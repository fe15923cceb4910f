//! Conversation state for one research run.
//!
//! [`Conversation`] is the ordered message log sent to the answering model.
//! It only grows, except for explicit rollbacks. [`Context`] is a scratch
//! map of derived facts that tool handlers write and prompt builders read.
//! Both live for one run and are never persisted.

use std::ops::Range;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::message::{ChatMessage, Role};

/// Conversation shared with concurrent tool workers.
pub type SharedConversation = Arc<Mutex<Conversation>>;
/// Context shared with concurrent tool workers.
pub type SharedContext = Arc<Mutex<Context>>;

/// Context key: queries already sent to the search tool.
pub const ISSUED_QUERIES: &str = "issued_queries";
/// Context key: follow-up questions already researched by expansion.
pub const RESEARCH_QUESTIONS: &str = "research_questions";

/// Ordered message log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Wraps the conversation for sharing with workers.
    #[must_use]
    pub fn into_shared(self) -> SharedConversation {
        Arc::new(Mutex::new(self))
    }

    /// Appends a message.
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Removes and returns the message at `index`, if there is one.
    pub fn remove(&mut self, index: usize) -> Option<ChatMessage> {
        (index < self.messages.len()).then(|| self.messages.remove(index))
    }

    /// Removes the messages in `span`, clamped to the log, and returns them.
    pub fn remove_span(&mut self, span: Range<usize>) -> Vec<ChatMessage> {
        let end = span.end.min(self.messages.len());
        let start = span.start.min(end);
        self.messages.drain(start..end).collect()
    }

    /// All messages in order.
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` when no message has been appended.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Content of the most recent message with `role`.
    #[must_use]
    pub fn last_content(&self, role: Role) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == role)
            .map(|m| m.content.as_str())
    }
}

/// Run-scoped scratch map.
///
/// Holds derived facts and flags only, never credentials.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    values: Map<String, Value>,
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the context for sharing with workers.
    #[must_use]
    pub fn into_shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// Reads a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Sets a value, returning the previous one.
    pub fn set(&mut self, key: &str, value: Value) -> Option<Value> {
        self.values.insert(key.to_string(), value)
    }

    /// Appends a string to the list stored at `key`, creating it if needed.
    ///
    /// A non-list value at `key` is replaced.
    pub fn push_str(&mut self, key: &str, item: &str) {
        let entry = self
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(items) = entry {
            items.push(Value::String(item.to_string()));
        }
    }

    /// The strings stored in the list at `key`; empty when absent.
    #[must_use]
    pub fn strings(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::{assistant_message, user_message};

    fn contents(conv: &Conversation) -> Vec<&str> {
        conv.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_remove_by_index() {
        let mut conv = Conversation::new();
        conv.push(user_message("1"));
        conv.push(user_message("2"));
        conv.push(user_message("3"));
        assert_eq!(conv.remove(1).map(|m| m.content), Some("2".to_string()));
        assert_eq!(contents(&conv), ["1", "3"]);
        assert!(conv.remove(2).is_none());
        assert!(conv.remove(5).is_none());
        assert_eq!(conv.len(), 2);
    }

    #[test]
    fn test_remove_on_empty_is_none() {
        let mut conv = Conversation::new();
        assert!(conv.remove(0).is_none());
        assert!(conv.remove_span(0..3).is_empty());
    }

    #[test]
    fn test_remove_span_keeps_later_turns() {
        let mut conv = Conversation::new();
        conv.push(user_message("q"));
        conv.push(assistant_message("reasoning"));
        conv.push(assistant_message("answer"));
        conv.push(user_message("trusted research"));
        let removed = conv.remove_span(1..3);
        assert_eq!(removed.len(), 2);
        assert_eq!(contents(&conv), ["q", "trusted research"]);
    }

    #[test]
    fn test_remove_span_clamps() {
        let mut conv = Conversation::new();
        conv.push(user_message("q"));
        conv.push(assistant_message("a"));
        assert_eq!(conv.remove_span(1..9).len(), 1);
        assert!(conv.remove_span(4..2).is_empty());
        assert_eq!(contents(&conv), ["q"]);
    }

    #[test]
    fn test_last_content() {
        let mut conv = Conversation::new();
        conv.push(assistant_message("draft"));
        conv.push(user_message("revise"));
        assert_eq!(conv.last_content(Role::Assistant), Some("draft"));
        assert_eq!(conv.last_content(Role::Tool), None);
    }

    #[test]
    fn test_context_string_lists() {
        let mut ctx = Context::new();
        assert!(ctx.strings(ISSUED_QUERIES).is_empty());
        ctx.push_str(ISSUED_QUERIES, "a");
        ctx.push_str(ISSUED_QUERIES, "b");
        assert_eq!(ctx.strings(ISSUED_QUERIES), ["a", "b"]);
    }

    #[test]
    fn test_context_push_replaces_scalar() {
        let mut ctx = Context::new();
        ctx.set(RESEARCH_QUESTIONS, Value::Bool(true));
        ctx.push_str(RESEARCH_QUESTIONS, "q");
        assert_eq!(ctx.strings(RESEARCH_QUESTIONS), ["q"]);
    }
}
