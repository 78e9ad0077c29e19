//! In-memory backends: useful for testing and single-process deployments.

use async_trait::async_trait;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tellerbot_core::{
    Conversation, ConversationId, ConversationStore, KeyValueStore, StoreError, Turn,
};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1000) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// LRU-bounded key-value store with per-entry expiry.
///
/// Expiry is checked lazily on read. Time comes from `tokio::time`, so tests
/// can run on a paused clock.
pub struct InMemoryKeyValueStore {
    entries: Mutex<LruCache<String, Entry>>,
}

impl InMemoryKeyValueStore {
    /// Create a store holding at most `capacity` entries (0 falls back to 1000).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(DEFAULT_CAPACITY);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of entries currently held, including not-yet-evicted expired ones.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY.get())
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let hit = entries
            .get(key)
            .map(|entry| (entry.is_expired(), entry.value.clone()));
        match hit {
            Some((true, _)) => {
                entries.pop(key);
                Ok(None)
            }
            Some((false, value)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().await.push(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.pop(key).is_some())
    }
}

/// Conversation store that keeps every conversation in a HashMap.
pub struct InMemoryConversationStore {
    conversations: Arc<RwLock<HashMap<ConversationId, Conversation>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn conversation_count(&self) -> usize {
        self.conversations.read().await.len()
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load(&self, id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        let conversations = self.conversations.read().await;
        Ok(conversations
            .get(id)
            .map(|c| c.turns().to_vec())
            .unwrap_or_default())
    }

    async fn append(&self, id: &ConversationId, turns: &[Turn]) -> Result<(), StoreError> {
        if turns.is_empty() {
            return Ok(());
        }
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .entry(id.clone())
            .or_insert_with(|| Conversation::new(id.clone()));
        for turn in turns {
            conversation.push(turn.clone());
        }
        Ok(())
    }

    async fn reset(&self, id: &ConversationId) -> Result<usize, StoreError> {
        let mut conversations = self.conversations.write().await;
        Ok(conversations.remove(id).map(|c| c.len()).unwrap_or(0))
    }
}
