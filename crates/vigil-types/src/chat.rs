//! Creator chat envelopes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a creator message arrived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatSource {
    Web,
    Telegram,
    Email,
}

impl fmt::Display for ChatSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChatSource::Web => "web",
            ChatSource::Telegram => "telegram",
            ChatSource::Email => "email",
        };
        write!(f, "{s}")
    }
}

/// A compact record of one executed action, attached to chat replies so
/// the creator can see what the agent did alongside what it said.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionSummary {
    pub tool: String,
    pub success: bool,
    /// Head of the tool output (already sanitized).
    pub output: String,
}

/// The completed answer to one pending creator chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    pub reply: String,
    pub model: String,
    pub provider: String,
    pub tokens: u64,
    #[serde(default)]
    pub actions: Vec<ActionSummary>,
}
