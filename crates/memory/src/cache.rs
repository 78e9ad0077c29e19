//! Response cache on top of a [`KeyValueStore`].
//!
//! Keys are normalized so trivially different phrasings of the same
//! question share an entry, and are scoped to one conversation.
//! The cache fails open: backend errors, undecodable values and slow
//! backends all read as a miss, and failed writes are dropped.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tellerbot_core::{ConversationId, KeyValueStore, Usage};
use tracing::{debug, warn};

/// Default freshness window for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Default bound on a single cache operation.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

/// Normalize a message into its cache key form.
///
/// Lower-cases, removes every character that is neither alphanumeric (in
/// any script), `_`, nor whitespace, collapses whitespace runs into one
/// space, and trims.
pub fn cache_key(message: &str) -> String {
    let stripped: String = message
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A normalized message bound to the conversation it was asked in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// `None` when nothing survives normalization; such messages bypass the cache.
    pub fn scoped(conversation: &ConversationId, message: &str) -> Option<Self> {
        let normalized = cache_key(message);
        if normalized.is_empty() {
            return None;
        }
        Some(Self(format!("{}:{}", conversation.as_str(), normalized)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored completion result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub text: String,
    pub usage: Usage,
    /// True when served from the cache rather than the completion endpoint.
    #[serde(default)]
    pub cached: bool,
}

impl CachedResponse {
    pub fn fresh(text: impl Into<String>, usage: Usage) -> Self {
        Self {
            text: text.into(),
            usage,
            cached: false,
        }
    }
}

/// Fail-open response cache.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
    op_timeout: Duration,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn backend(&self) -> &str {
        self.store.name()
    }

    /// Look up a cached response. Never fails; problems read as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let raw = match tokio::time::timeout(self.op_timeout, self.store.get(key.as_str())).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Ok(Err(e)) => {
                warn!(backend = %self.store.name(), error = %e, "Cache read failed, treating as miss");
                return None;
            }
            Err(_) => {
                warn!(
                    backend = %self.store.name(),
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Cache read timed out, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_str::<CachedResponse>(&raw) {
            Ok(mut hit) => {
                debug!(key = %key, "Cache hit");
                hit.cached = true;
                Some(hit)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable cache entry, evicting");
                if let Ok(Err(e)) =
                    tokio::time::timeout(self.op_timeout, self.store.delete(key.as_str())).await
                {
                    warn!(backend = %self.store.name(), error = %e, "Cache eviction failed");
                }
                None
            }
        }
    }

    /// Store a response under the configured TTL. Errors are logged and dropped.
    pub async fn set(&self, key: &CacheKey, response: &CachedResponse) {
        let stored = CachedResponse {
            cached: false,
            ..response.clone()
        };
        let value = match serde_json::to_string(&stored) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to encode cache entry");
                return;
            }
        };

        match tokio::time::timeout(
            self.op_timeout,
            self.store.set(key.as_str(), value, self.ttl),
        )
        .await
        {
            Ok(Ok(())) => debug!(key = %key, ttl_secs = self.ttl.as_secs(), "Cached response"),
            Ok(Err(e)) => {
                warn!(backend = %self.store.name(), error = %e, "Cache write failed, dropping")
            }
            Err(_) => warn!(backend = %self.store.name(), "Cache write timed out, dropping"),
        }
    }

    /// Reachability of the backing store, bounded by the op timeout.
    pub async fn ping(&self) -> bool {
        tokio::time::timeout(self.op_timeout, self.store.ping())
            .await
            .unwrap_or(false)
    }
}
