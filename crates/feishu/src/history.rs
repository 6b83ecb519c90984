use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One prior exchange in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    /// Display name or open_id of the sender, for group chats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub content: String,
    pub timestamp_ms: i64,
}

/// Conversation history keyed by chat ID.
///
/// Cloning shares the underlying map. The gateway hands a clone to the
/// message handler, which is the only writer; the gateway itself only calls
/// [`HistoryStore::clear`] on stop.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    inner: Arc<RwLock<HashMap<String, Vec<Turn>>>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Turns for a conversation, oldest first.
    pub fn turns(&self, chat_id: &str) -> Vec<Turn> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(chat_id).cloned().unwrap_or_default()
    }

    pub fn push(&self, chat_id: &str, turn: Turn) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.entry(chat_id.to_string()).or_default().push(turn);
    }

    /// Append a turn and drop the oldest ones so at most `limit` remain.
    pub fn push_bounded(&self, chat_id: &str, turn: Turn, limit: usize) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let turns = map.entry(chat_id.to_string()).or_default();
        turns.push(turn);
        if turns.len() > limit {
            let excess = turns.len() - limit;
            turns.drain(..excess);
        }
    }

    /// Forget one conversation.
    pub fn remove(&self, chat_id: &str) -> Option<Vec<Turn>> {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.remove(chat_id)
    }

    pub fn conversation_count(&self) -> usize {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversation_count() == 0
    }

    pub fn clear(&self) {
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());
        map.clear();
    }
}
