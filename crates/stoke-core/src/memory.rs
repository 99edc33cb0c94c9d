use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a [`Message`] in the conversation (spec §3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Immutable conversation record (spec §3). Created by [`Memory`]'s
/// constructors and appended only — never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub parent_message_id: Option<Uuid>,
    pub role: Role,
    pub content: String,
    pub timestamp: u64,
    pub metadata: std::collections::HashMap<String, Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_message_id: None,
            role,
            content: content.into(),
            timestamp: current_timestamp(),
            metadata: std::collections::HashMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: Uuid) -> Self {
        self.parent_message_id = Some(parent);
        self
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Trait for counting tokens in a prompt, injected so this crate never
/// ships a concrete tokenizer (spec §6.3 — out of scope).
pub trait Tokenizer: Send + Sync {
    fn count_messages_tokens(&self, messages: &[Message]) -> usize;
}

/// Ordered, append-only message log (spec §4.3). All mutation happens on
/// the agent loop's task; external readers only ever see [`Memory::snapshot`]
/// copies.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Atomically replace `[start, end)` with a single synthetic message
    /// (spec §4.3/§4.7 — used by summarization strategies). `start`/`end`
    /// are indices into the current log.
    pub fn replace_range(&mut self, start: usize, end: usize, with: Message) {
        assert!(start <= end && end <= self.messages.len());
        self.messages.splice(start..end, std::iter::once(with));
    }

    pub fn token_size(&self, tokenizer: &dyn Tokenizer) -> usize {
        tokenizer.count_messages_tokens(&self.messages)
    }

    /// Spec §4.3 invariant: "system message (if any) is always index 0".
    pub fn has_leading_system_message(&self) -> bool {
        match self.messages.first() {
            Some(m) => m.role == Role::System,
            None => true,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }
}
