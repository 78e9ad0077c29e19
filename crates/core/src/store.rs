//! Storage traits: the two black-box collaborators the chat core needs.
//!
//! - [`KeyValueStore`]: get / set-with-TTL, backs the response cache
//! - [`ConversationStore`]: append-only turn log per conversation
//!
//! Implementations live in `tellerbot-memory` (in-memory, SQLite, no-op).

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;
use crate::message::{ConversationId, Turn};

/// A key-value store with per-entry expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// The backend name (e.g., "in_memory", "none").
    fn name(&self) -> &str;

    /// Fetch a live value; expired entries read as `None`.
    async fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration)
    -> std::result::Result<(), StoreError>;

    /// Remove a value. Returns whether it existed.
    async fn delete(&self, key: &str) -> std::result::Result<bool, StoreError>;

    /// Reachability probe for the health endpoint.
    async fn ping(&self) -> bool {
        true
    }
}

/// Durable, append-only conversation log.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "in_memory", "none").
    fn name(&self) -> &str;

    /// Load all turns for a conversation, oldest first. Unknown ids yield an empty list.
    async fn load(&self, id: &ConversationId) -> std::result::Result<Vec<Turn>, StoreError>;

    /// Append turns in order.
    async fn append(
        &self,
        id: &ConversationId,
        turns: &[Turn],
    ) -> std::result::Result<(), StoreError>;

    /// Delete the conversation's history. Returns the number of turns removed.
    async fn reset(&self, id: &ConversationId) -> std::result::Result<usize, StoreError>;

    /// Reachability probe for the health endpoint.
    async fn ping(&self) -> bool {
        true
    }
}
