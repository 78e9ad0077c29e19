//! Context assembly: fit system prompt, history and the new message into
//! a token budget.
//!
//! # Algorithm
//!
//! 1. Estimate system + user + full history.
//! 2. While over budget and history remains, drop the oldest turn.
//! 3. If anything was dropped, build a synopsis of the dropped turns and
//!    place it in front of the retained history only if it still fits.
//!    This is attempted once; nothing further is dropped to make room.
//! 4. Emit `[system] + history + [user]`.
//!
//! The user message is always last and verbatim, the system prompt always
//! first. When those two alone exceed the budget they are still emitted and
//! the metadata is flagged `over_budget`.
//!
//! # Determinism
//!
//! Identical inputs produce identical turn contents and metadata.

use crate::context::summarizer::HistorySummarizer;
use crate::context::token;
use serde::{Deserialize, Serialize};
use tellerbot_core::Turn;

// ── Types ─────────────────────────────────────────────────────────────────

/// Token budget configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    /// Model context window.
    pub total: usize,
    /// Tokens held back for the model's reply.
    pub reserved_for_response: usize,
}

impl TokenBudget {
    pub fn new(total: usize, reserved_for_response: usize) -> Self {
        Self {
            total,
            reserved_for_response,
        }
    }

    /// Tokens available to system prompt + history + user message.
    pub fn history_budget(&self) -> usize {
        self.total.saturating_sub(self.reserved_for_response)
    }
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new(4096, 500)
    }
}

/// All inputs required by the assembler for a single completion call.
pub struct AssemblyInput<'a> {
    pub system_prompt: &'a str,
    /// Prior turns, oldest first (possibly already summarized).
    pub history: &'a [Turn],
    pub user_message: &'a str,
}

/// The assembled turn list, ready for a completion call.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// `[system] + history + [user]`.
    pub messages: Vec<Turn>,
    pub metadata: AssemblyMetadata,
}

impl AssembledContext {
    /// The final user turn.
    pub fn user_turn(&self) -> Option<&Turn> {
        self.messages.last()
    }
}

/// What the assembler did, for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    /// Estimated tokens of the emitted turns.
    pub total_tokens: usize,
    /// Budget the turns were fitted into.
    pub budget: usize,
    /// History turns emitted (the synopsis counts as one).
    pub history_included: usize,
    /// History turns offered.
    pub history_total: usize,
    /// History turns dropped oldest-first.
    pub dropped: usize,
    /// Whether a synopsis of the dropped turns was included.
    pub summarized: bool,
    /// System prompt + user message alone exceed the budget.
    pub over_budget: bool,
}

// ── Assembler ─────────────────────────────────────────────────────────────

/// The context assembler. Stateless; create one and reuse it.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    budget: TokenBudget,
    summarizer: HistorySummarizer,
}

impl ContextAssembler {
    pub fn new(budget: TokenBudget) -> Self {
        Self {
            budget,
            summarizer: HistorySummarizer::default(),
        }
    }

    /// Summarizer used for the synopsis of dropped turns.
    pub fn with_summarizer(mut self, summarizer: HistorySummarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn budget(&self) -> TokenBudget {
        self.budget
    }

    pub fn assemble(&self, input: &AssemblyInput<'_>) -> AssembledContext {
        let budget = self.budget.history_budget();
        let system = Turn::system(input.system_prompt);
        let user = Turn::user(input.user_message);
        let fixed = system.tokens() + user.tokens();

        // ── Drop oldest-first ──────────────────────────────────────────────
        let mut start = 0;
        let mut history_tokens = token::estimate_turns_tokens(input.history);
        while fixed + history_tokens > budget && start < input.history.len() {
            history_tokens -= input.history[start].tokens();
            start += 1;
        }
        let (dropped, kept) = input.history.split_at(start);

        // ── One synopsis attempt ───────────────────────────────────────────
        let synopsis = if dropped.is_empty() {
            None
        } else {
            let synopsis = self.summarizer.synopsis(dropped);
            (fixed + history_tokens + synopsis.tokens() <= budget).then_some(synopsis)
        };
        let summarized = synopsis.is_some();
        if let Some(s) = &synopsis {
            history_tokens += s.tokens();
        }

        let mut messages = Vec::with_capacity(kept.len() + 3);
        messages.push(system);
        messages.extend(synopsis);
        messages.extend_from_slice(kept);
        messages.push(user);

        let metadata = AssemblyMetadata {
            total_tokens: fixed + history_tokens,
            budget,
            history_included: kept.len() + usize::from(summarized),
            history_total: input.history.len(),
            dropped: dropped.len(),
            summarized,
            over_budget: fixed > budget,
        };

        tracing::debug!(
            total_tokens = metadata.total_tokens,
            budget = metadata.budget,
            dropped = metadata.dropped,
            summarized = metadata.summarized,
            over_budget = metadata.over_budget,
            "Assembled context"
        );

        AssembledContext { messages, metadata }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new(TokenBudget::default())
    }
}
