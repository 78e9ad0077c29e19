//! Completion providers for Tellerbot.
//!
//! All providers implement the `tellerbot_core::Provider` trait.
//! `OpenAiCompatProvider` talks to the external completion endpoint;
//! `RetryingProvider` wraps any provider with bounded exponential backoff.

pub mod openai_compat;
pub mod retry;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::{with_retry, RetryConfig, RetryPolicy, RetryingProvider};
