//! Context pipeline: estimate, summarize, and fit a conversation into the
//! model's token budget.
//!
//! | Stage | Module | Trim strategy |
//! |-------|--------|---------------|
//! | Token estimate | [`token`] | ~4 characters per token |
//! | Summarize | [`summarizer`] | Older turns folded into one topic synopsis |
//! | Assemble | [`assembler`] | Oldest turns dropped; system first, user last |

pub mod assembler;
pub mod summarizer;
pub mod token;

pub use assembler::{AssembledContext, AssemblyInput, AssemblyMetadata, ContextAssembler, TokenBudget};
pub use summarizer::{HistorySummarizer, TopicTable};
