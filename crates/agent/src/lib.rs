//! The chat core of Tellerbot.
//!
//! Every inbound message follows the same path:
//!
//! 1. **Lock** the conversation ([`locks`])
//! 2. **Check the cache** for an identical question in the same conversation
//! 3. **Build context**: summarize long histories and trim to the token
//!    budget ([`context`])
//! 4. **Shape** the request when the daily budget is exhausted
//! 5. **Complete** via the configured provider, with retries
//! 6. **Record** cost, cache the reply, and append the exchange
//!
//! [`chat::ChatService`] ties the steps together.

pub mod chat;
pub mod context;
pub mod locks;

pub use chat::{ChatReply, ChatRequest, ChatService, ChatSettings, HealthReport};
pub use context::{
    AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, HistorySummarizer,
    TokenBudget, TopicTable,
};
pub use locks::{ConversationGuard, ConversationLocks};
