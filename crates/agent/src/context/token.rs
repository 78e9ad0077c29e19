//! Token estimation for turn sequences.
//!
//! The per-string heuristic lives in `tellerbot_core::tokens` so that a
//! [`Turn`] can cache its own estimate at construction; this module adds
//! the sequence-level helpers the assembler needs.

use tellerbot_core::Turn;

pub use tellerbot_core::tokens::{estimate_tokens, CHARS_PER_TOKEN};

/// Sum of the cached per-turn estimates.
pub fn estimate_turns_tokens(turns: &[Turn]) -> usize {
    turns.iter().map(Turn::tokens).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slice_is_zero() {
        assert_eq!(estimate_turns_tokens(&[]), 0);
    }

    #[test]
    fn sums_turn_estimates() {
        let turns = vec![
            Turn::user("hello"),       // 5 chars → 2
            Turn::assistant("world!"), // 6 chars → 2
            Turn::system("abcd"),      // 4 chars → 1
        ];
        assert_eq!(estimate_turns_tokens(&turns), 5);
    }

    #[test]
    fn matches_string_estimate() {
        let text = "How much should I keep in an emergency fund?";
        assert_eq!(
            estimate_turns_tokens(&[Turn::user(text)]),
            estimate_tokens(text)
        );
    }
}
