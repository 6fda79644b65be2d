//! The planner's output contract.
//!
//! A [`Plan`] is the typed form of the JSON object the planning model is
//! asked to produce each iteration. Parsing happens once, at the planner's
//! repair layer; everything downstream operates on these types. Unknown
//! keys from the model are ignored, and the numeric fields tolerate the
//! string-wrapped numbers some models emit.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::tier::Tier;

/// One action the agent wants executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    /// Registered tool name.
    pub tool: String,
    /// Tool parameters as a JSON object.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Optional per-action model tier for tools that route LLM calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl Action {
    /// Convenience constructor for tests and internal callers.
    pub fn new(tool: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            parameters,
            tier: None,
        }
    }

    /// The `path` parameter, when present and a string.
    pub fn path_param(&self) -> Option<&str> {
        self.parameters.get("path").and_then(Value::as_str)
    }
}

/// A goal replacement from the planner: either tiered or a flat list.
///
/// A flat list replaces the short-term tier only (legacy form).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GoalsUpdate {
    Tiered {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        short_term: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mid_term: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        long_term: Option<Vec<String>>,
    },
    Flat(Vec<String>),
}

/// A scratch-pad delta: add notes, remove by index, or replace wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScratchpadUpdate {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Vec<String>>,
}

impl ScratchpadUpdate {
    /// `true` when the delta carries no changes.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty() && self.replace.is_none()
    }
}

/// Requested retrieval-tuning changes. Values are clamped server-side by
/// the working memory before they take effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryConfigUpdate {
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub retrieval_count: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub max_context_tokens: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub decay_factor: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub relevance_threshold: Option<f64>,
}

/// The plan for one iteration, as produced by the planning model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The model's reasoning text.
    #[serde(default)]
    pub thinking: String,
    /// Actions to execute, in order.
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Optional goal replacement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals_update: Option<GoalsUpdate>,
    /// Optional scratch-pad delta.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_term_memories_update: Option<ScratchpadUpdate>,
    /// Optional retrieval-tuning request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_config: Option<MemoryConfigUpdate>,
    /// Requested sleep before the next iteration (clamped by the loop).
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub sleep_seconds: Option<f64>,
    /// Reply to the creator; required when creator chat was pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_reply: Option<String>,
    /// Short dashboard status line.
    #[serde(default = "default_status")]
    pub status_message: String,
}

impl Default for Plan {
    fn default() -> Self {
        Self {
            thinking: String::new(),
            actions: Vec::new(),
            goals_update: None,
            short_term_memories_update: None,
            memory_config: None,
            sleep_seconds: None,
            chat_reply: None,
            status_message: default_status(),
        }
    }
}

fn default_status() -> String {
    "Processing...".to_string()
}

/// Accept a number, a numeric string, or null for optional f64 fields.
/// Anything else parses as `None` rather than failing the whole plan.
fn lenient_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

// ── Triage ──────────────────────────────────────────────────────────────

/// The triage model's complexity assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Idle,
    Low,
    Medium,
    High,
}

/// What to do instead of a full plan when triage says none is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QuickAction {
    #[serde(default, deserialize_with = "lenient_opt_f64")]
    pub sleep_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// Phase-one output: which tier should plan, and whether to plan at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriageDecision {
    pub complexity: Complexity,
    pub tier: Tier,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_true")]
    pub needs_full_plan: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_action: Option<QuickAction>,
}

fn default_true() -> bool {
    true
}

impl TriageDecision {
    /// The forced decision when creator chat is pending: always a full
    /// plan at the strongest tier.
    pub fn for_creator_chat() -> Self {
        Self {
            complexity: Complexity::High,
            tier: Tier::Level1,
            reason: "creator chat".into(),
            needs_full_plan: true,
            quick_action: None,
        }
    }

    /// The conservative fallback when triage itself fails or returns
    /// garbage: a medium full plan, never the top tier.
    pub fn fallback(reason: impl Into<String>) -> Self {
        Self {
            complexity: Complexity::Medium,
            tier: Tier::Level2,
            reason: reason.into(),
            needs_full_plan: true,
            quick_action: None,
        }
    }
}

/// A plan together with the metadata of the iteration that produced it.
///
/// The triage decision and the responding model are carried alongside the
/// plan rather than inside it, so the plan type stays a pure wire contract.
#[derive(Debug, Clone)]
pub struct PlannedIteration {
    pub plan: Plan,
    pub triage: TriageDecision,
    /// Model that produced the plan; `"triage-only"` for idle short-circuits.
    pub model: String,
    pub provider: String,
    pub tokens: u64,
}
