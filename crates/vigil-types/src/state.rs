//! Durable agent state.
//!
//! [`AgentState`] is the singleton record the whole runtime revolves
//! around: the directive, three tiers of goals, the scratch pad of
//! short-term notes, and the loop counters. Only the state persistor
//! mutates it; everyone else sees snapshots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Hard cap on scratch-pad entries.
pub const STM_MAX_ENTRIES: usize = 50;
/// Scratch-pad entries older than this are evicted on maintenance.
pub const STM_MAX_AGE_HOURS: i64 = 48;
/// Individual scratch-pad entries are truncated to this many characters.
pub const STM_MAX_CONTENT_CHARS: usize = 500;

/// One entry in the agent's short-term scratch pad.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortTermNote {
    /// Note text, at most [`STM_MAX_CONTENT_CHARS`] characters.
    pub content: String,
    /// When the note was written.
    pub created_at: DateTime<Utc>,
    /// The loop iteration that wrote it.
    #[serde(default)]
    pub iteration: u64,
}

impl ShortTermNote {
    /// Create a note, truncating overlong content.
    pub fn new(content: &str, iteration: u64) -> Self {
        Self {
            content: truncate_chars(content, STM_MAX_CONTENT_CHARS),
            created_at: Utc::now(),
            iteration,
        }
    }

    /// `true` once the note is past the scratch-pad age limit.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at > Duration::hours(STM_MAX_AGE_HOURS)
    }
}

/// The singleton durable state of the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    /// Free-form top-level mandate. Modifiable at runtime.
    pub directive: String,
    /// Immediate goals (this iteration or the next few).
    pub short_term_goals: Vec<String>,
    /// Project-scale goals (weeks).
    pub mid_term_goals: Vec<String>,
    /// Strategic, ongoing goals.
    pub long_term_goals: Vec<String>,
    /// Legacy flat goal list, kept as a write-through mirror of
    /// `short_term_goals`. Reads prefer the tiered fields.
    #[serde(default)]
    pub current_goals: Vec<String>,
    /// What the agent reported it is doing right now.
    pub active_task: Option<String>,
    /// Monotonic loop iteration counter.
    pub iteration: u64,
    /// Whether the loop is paused.
    pub paused: bool,
    /// The short-term scratch pad.
    #[serde(default)]
    pub short_term_memories: Vec<ShortTermNote>,
    /// First boot time.
    pub started_at: DateTime<Utc>,
    /// Last time the loop proved it was alive.
    pub last_heartbeat: DateTime<Utc>,
}

impl AgentState {
    /// Short-term goals with the legacy fallback applied: the tiered field
    /// wins, `current_goals` only fills in when it is empty.
    pub fn effective_short_term_goals(&self) -> &[String] {
        if self.short_term_goals.is_empty() {
            &self.current_goals
        } else {
            &self.short_term_goals
        }
    }

    /// Every goal across all tiers, short-term first.
    pub fn all_goals(&self) -> Vec<String> {
        let mut goals = Vec::with_capacity(
            self.short_term_goals.len() + self.mid_term_goals.len() + self.long_term_goals.len(),
        );
        goals.extend(self.effective_short_term_goals().iter().cloned());
        goals.extend(self.mid_term_goals.iter().cloned());
        goals.extend(self.long_term_goals.iter().cloned());
        goals
    }
}

/// Truncate a string to at most `max` characters on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
