//! History summarization.
//!
//! Long conversations are compressed into one synthetic system turn that
//! names the banking topics discussed so far, followed by the most recent
//! turns verbatim. Topic detection is plain keyword matching over a
//! data table, so adding a topic never touches this code.

use tellerbot_core::Turn;

const SUMMARY_PREFIX: &str = "Earlier in this conversation the customer discussed: ";
const GENERAL_SUMMARY: &str =
    "Earlier in this conversation the customer asked general banking questions.";

/// Ordered topic → keyword table.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicTable {
    topics: Vec<(String, Vec<String>)>,
}

impl TopicTable {
    /// Build a table from `(topic, keywords)` pairs. Keywords match
    /// case-insensitively; topics are reported in table order.
    pub fn new<T, K>(topics: impl IntoIterator<Item = (T, K)>) -> Self
    where
        T: Into<String>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        Self {
            topics: topics
                .into_iter()
                .map(|(name, keywords)| {
                    (
                        name.into(),
                        keywords
                            .into_iter()
                            .map(|k| k.as_ref().to_lowercase())
                            .filter(|k| !k.is_empty())
                            .collect(),
                    )
                })
                .collect(),
        }
    }

    /// The built-in retail-banking topics.
    pub fn banking() -> Self {
        Self::new([
            ("savings", vec!["savings", "save", "deposit", "interest"]),
            ("credit", vec!["credit", "card", "score"]),
            (
                "investment",
                vec!["invest", "stock", "fund", "portfolio", "retirement"],
            ),
            ("budget", vec!["budget", "spending", "expense"]),
            ("loans", vec!["loan", "mortgage", "borrow", "debt"]),
        ])
    }

    /// Topics mentioned anywhere in `turns`, in table order.
    pub fn detect(&self, turns: &[Turn]) -> Vec<&str> {
        let lowered: Vec<String> = turns.iter().map(|t| t.content().to_lowercase()).collect();
        self.topics
            .iter()
            .filter(|(_, keywords)| {
                keywords
                    .iter()
                    .any(|k| lowered.iter().any(|content| content.contains(k.as_str())))
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl Default for TopicTable {
    fn default() -> Self {
        Self::banking()
    }
}

/// Compresses long histories into a topic synopsis plus recent turns.
#[derive(Debug, Clone)]
pub struct HistorySummarizer {
    keep_recent: usize,
    trigger_turns: usize,
    topics: TopicTable,
}

impl HistorySummarizer {
    /// Summarize once a history has more than `trigger_turns` turns,
    /// keeping the last `keep_recent` verbatim.
    pub fn new(keep_recent: usize, trigger_turns: usize) -> Self {
        Self {
            keep_recent,
            trigger_turns: trigger_turns.max(keep_recent + 1),
            topics: TopicTable::default(),
        }
    }

    pub fn with_topics(mut self, topics: TopicTable) -> Self {
        self.topics = topics;
        self
    }

    pub fn topics(&self) -> &TopicTable {
        &self.topics
    }

    /// Return `[synopsis] + last keep_recent turns` when the history is long,
    /// otherwise the history unchanged. The input is never modified.
    pub fn summarize(&self, turns: &[Turn]) -> Vec<Turn> {
        if turns.len() <= self.trigger_turns {
            return turns.to_vec();
        }

        let split = turns.len() - self.keep_recent;
        let (older, recent) = turns.split_at(split);

        let mut out = Vec::with_capacity(recent.len() + 1);
        out.push(self.synopsis(older));
        out.extend_from_slice(recent);
        out
    }

    /// A synthetic system turn naming the topics found in `turns`.
    pub fn synopsis(&self, turns: &[Turn]) -> Turn {
        let topics = self.topics.detect(turns);
        if topics.is_empty() {
            Turn::system(GENERAL_SUMMARY)
        } else {
            Turn::system(format!("{SUMMARY_PREFIX}{}.", topics.join(", ")))
        }
    }
}

impl Default for HistorySummarizer {
    fn default() -> Self {
        Self::new(2, 20)
    }
}
