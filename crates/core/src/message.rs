//! Turn and Conversation domain types.
//!
//! These are the core value objects that flow through the entire system:
//! customer sends a message → gateway validates it → chat service assembles
//! context → provider generates the advisor's reply.

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::error::ValidationError;
use crate::tokens::estimate_tokens;

/// Identifier-safe pattern for conversation ids.
const CONVERSATION_ID_PATTERN: &str = r"^[A-Za-z0-9_-]{1,64}$";

fn conversation_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONVERSATION_ID_PATTERN).expect("static pattern compiles"))
}

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(String);

impl ConversationId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Validate an id supplied by a client.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if conversation_id_regex().is_match(s) {
            Ok(Self(s.to_string()))
        } else {
            Err(ValidationError::InvalidConversationId(
                s.chars().take(80).collect(),
            ))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The bank customer
    User,
    /// The advisor model
    Assistant,
    /// Fixed instructions and synthetic summaries
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }

    /// Parse the lowercase wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A single message in a conversation.
///
/// Immutable once created: the token estimate is computed at construction
/// and fields are only exposed through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    id: String,
    role: Role,
    content: String,
    tokens: usize,
    timestamp: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            tokens: estimate_tokens(&content),
            content,
            timestamp: Utc::now(),
        }
    }

    /// Create a customer turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    /// Create an advisor turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into())
    }

    /// Create a system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    /// Rebuild a persisted turn. The token estimate is recomputed.
    pub fn restore(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            role,
            tokens: estimate_tokens(&content),
            content,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Approximate token count of the content.
    pub fn tokens(&self) -> usize {
        self.tokens
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// A conversation is an ordered, append-only sequence of turns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    /// Ordered turns, oldest first
    turns: Vec<Turn>,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new(id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            id,
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a conversation from persisted turns.
    pub fn from_turns(id: ConversationId, turns: Vec<Turn>) -> Self {
        let created_at = turns.first().map(Turn::timestamp).unwrap_or_else(Utc::now);
        let updated_at = turns.last().map(Turn::timestamp).unwrap_or(created_at);
        Self {
            id,
            turns,
            created_at,
            updated_at,
        }
    }

    /// Append a turn.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Sum of the per-turn token estimates.
    pub fn estimated_tokens(&self) -> usize {
        self.turns.iter().map(Turn::tokens).sum()
    }
}
