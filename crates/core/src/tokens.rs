//! Token estimation.
//!
//! Character-based heuristic: ~4 characters per token. Accurate within
//! ~10% for BPE tokenizers on English text, which is all the budgeting
//! logic needs.

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count for a string.
///
/// Counts characters rather than bytes so accented or non-Latin text is
/// not over-counted. Rounds up; the empty string is zero tokens.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}
