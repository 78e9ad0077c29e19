//! Per-conversation mutual exclusion.
//!
//! Requests for the same conversation run one at a time so that cache
//! lookups, history loads and appends never interleave. Different
//! conversations never contend. Entries are pruned when the last holder
//! releases them, so the table only grows with in-flight conversations.

use dashmap::DashMap;
use std::sync::Arc;
use tellerbot_core::ConversationId;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// Keyed lock table.
#[derive(Clone, Default)]
pub struct ConversationLocks {
    table: Arc<LockTable>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: &ConversationId) -> ConversationGuard {
        let mutex = self
            .table
            .entry(id.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        ConversationGuard {
            guard: Some(guard),
            key: id.as_str().to_string(),
            table: Arc::clone(&self.table),
        }
    }

    /// Conversations currently locked or waited on.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Exclusive access to one conversation.
pub struct ConversationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: Arc<LockTable>,
}

impl ConversationGuard {
    pub fn conversation(&self) -> &str {
        &self.key
    }
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc count reflects only the table
        // and any waiters.
        self.guard.take();
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
