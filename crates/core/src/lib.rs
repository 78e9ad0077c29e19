//! # Tellerbot Core
//!
//! Domain types, traits, and error definitions for the Tellerbot chat proxy.
//! This crate has **no framework dependencies**: it defines the domain model
//! that all other crates implement against.
//!
//! Every external collaborator (completion endpoint, key-value cache,
//! conversation store) is a trait here; implementations live in their
//! respective crates so tests can swap in stubs.

pub mod error;
pub mod message;
pub mod provider;
pub mod store;
pub mod tokens;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError, ValidationError};
pub use message::{Conversation, ConversationId, Role, Turn};
pub use provider::{GenerationParams, Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::{ConversationStore, KeyValueStore};
pub use tokens::estimate_tokens;
