//! Cache and conversation-store implementations for Tellerbot.

pub mod cache;
pub mod in_memory;
pub mod noop;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use cache::{cache_key, CacheKey, CachedResponse, ResponseCache};
pub use in_memory::{InMemoryConversationStore, InMemoryKeyValueStore};
pub use noop::NoopConversationStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteConversationStore;
