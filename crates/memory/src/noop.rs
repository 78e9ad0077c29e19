//! No-op backend: disable conversation persistence entirely.

use async_trait::async_trait;
use tellerbot_core::{ConversationId, ConversationStore, StoreError, Turn};

/// A conversation store that forgets everything; every conversation starts empty.
pub struct NoopConversationStore;

#[async_trait]
impl ConversationStore for NoopConversationStore {
    fn name(&self) -> &str {
        "none"
    }

    async fn load(&self, _id: &ConversationId) -> Result<Vec<Turn>, StoreError> {
        Ok(Vec::new())
    }

    async fn append(&self, _id: &ConversationId, _turns: &[Turn]) -> Result<(), StoreError> {
        Ok(())
    }

    async fn reset(&self, _id: &ConversationId) -> Result<usize, StoreError> {
        Ok(0)
    }
}
