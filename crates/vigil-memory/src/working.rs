//! The rolling working context.
//!
//! [`WorkingMemory`] holds the system prompt, the ordered message window,
//! and the memories injected for the current iteration. Token usage is
//! estimated at one token per four characters; after every append the
//! oldest messages are dropped until the estimate fits the configured
//! budget (always keeping at least the last two messages).

use serde_json::{json, Value};
use tracing::{debug, info};

use vigil_types::plan::MemoryConfigUpdate;

/// Default number of memories retrieved per iteration.
const DEFAULT_RETRIEVAL_COUNT: usize = 10;
/// Default working-context budget in estimated tokens.
const DEFAULT_MAX_CONTEXT_TOKENS: usize = 120_000;
/// Default importance decay per maintenance cycle.
const DEFAULT_DECAY_FACTOR: f64 = 0.95;
/// Default minimum relevance for injection (0 = inject everything).
const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.0;

/// One message in the rolling window.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextMessage {
    pub role: String,
    pub content: String,
}

/// Retrieval and context tuning, adjustable at runtime by the agent
/// itself through `memory_config` plan updates. Every setter clamps.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    pub retrieval_count: usize,
    pub max_context_tokens: usize,
    pub decay_factor: f64,
    pub relevance_threshold: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            retrieval_count: DEFAULT_RETRIEVAL_COUNT,
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            decay_factor: DEFAULT_DECAY_FACTOR,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
        }
    }
}

impl MemoryConfig {
    /// Apply a planner-requested update, clamping every value to its
    /// sane range. Unknown or absent fields are left untouched.
    pub fn apply(&mut self, update: &MemoryConfigUpdate) {
        if let Some(count) = update.retrieval_count {
            self.retrieval_count = (count.round() as i64).clamp(1, 100) as usize;
            info!(retrieval_count = self.retrieval_count, "memory config updated");
        }
        if let Some(tokens) = update.max_context_tokens {
            self.max_context_tokens = (tokens.round() as i64).clamp(1_000, 200_000) as usize;
            info!(max_context_tokens = self.max_context_tokens, "memory config updated");
        }
        if let Some(decay) = update.decay_factor {
            self.decay_factor = decay.clamp(0.5, 1.0);
            info!(decay_factor = self.decay_factor, "memory config updated");
        }
        if let Some(threshold) = update.relevance_threshold {
            self.relevance_threshold = threshold.clamp(0.0, 1.0);
            info!(
                relevance_threshold = self.relevance_threshold,
                "memory config updated"
            );
        }
    }
}

/// The per-process rolling buffer feeding each LLM call.
pub struct WorkingMemory {
    system_prompt: String,
    messages: Vec<ContextMessage>,
    injected_memories: Vec<String>,
    injected_raw: Vec<Value>,
    config: MemoryConfig,
}

impl Default for WorkingMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self {
            system_prompt: String::new(),
            messages: Vec::new(),
            injected_memories: Vec::new(),
            injected_raw: Vec::new(),
            config: MemoryConfig::default(),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn update_config(&mut self, update: &MemoryConfigUpdate) {
        self.config.apply(update);
        self.trim_if_needed();
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// Append a message and trim the window back under the token budget.
    pub fn add_message(&mut self, role: &str, content: &str) {
        self.messages.push(ContextMessage {
            role: role.to_string(),
            content: content.to_string(),
        });
        self.trim_if_needed();
    }

    /// Replace the injected-memory block for this iteration.
    pub fn inject_memories(&mut self, memories: Vec<String>, raw: Vec<Value>) {
        self.injected_memories = memories;
        self.injected_raw = raw;
    }

    pub fn injected_count(&self) -> usize {
        self.injected_memories.len()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// The full message list for an LLM call: the system prompt (with the
    /// relevant-memories block appended) followed by the window.
    pub fn messages_for_llm(&self) -> Vec<ContextMessage> {
        let mut system = self.system_prompt.clone();
        if !self.injected_memories.is_empty() {
            system.push_str("\n\n## RELEVANT MEMORIES\n");
            for memory in &self.injected_memories {
                system.push_str("- ");
                system.push_str(memory);
                system.push('\n');
            }
        }

        let mut out = Vec::with_capacity(self.messages.len() + 1);
        out.push(ContextMessage {
            role: "system".to_string(),
            content: system,
        });
        out.extend(self.messages.iter().cloned());
        out
    }

    /// Drop everything from the window and the injection block.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.injected_memories.clear();
        self.injected_raw.clear();
    }

    /// Replace all but the last two messages with a single summary
    /// message. No-op on short windows.
    pub fn summarize_and_compress(&mut self, summary: &str) {
        if self.messages.len() <= 2 {
            return;
        }
        let kept = self.messages.split_off(self.messages.len() - 2);
        self.messages = Vec::with_capacity(3);
        self.messages.push(ContextMessage {
            role: "system".to_string(),
            content: format!("[Summary of prior conversation]: {summary}"),
        });
        self.messages.extend(kept);
        info!(remaining = self.messages.len(), "context compressed");
    }

    /// Estimated tokens across the prompt, injections, and window,
    /// at roughly four characters per token.
    pub fn estimate_tokens(&self) -> usize {
        let mut chars = self.system_prompt.len();
        for memory in &self.injected_memories {
            chars += memory.len();
        }
        for msg in &self.messages {
            chars += msg.content.len();
        }
        chars / 4
    }

    /// A truncated view of the context for dashboards.
    pub fn snapshot(&self) -> Value {
        let messages: Vec<Value> = self
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role,
                    "content": m.content.chars().take(2000).collect::<String>(),
                    "full_length": m.content.len(),
                })
            })
            .collect();
        json!({
            "system_prompt_length": self.system_prompt.len(),
            "system_prompt_tokens": self.system_prompt.len() / 4,
            "message_count": self.messages.len(),
            "messages": messages,
            "injected_memory_count": self.injected_memories.len(),
            "injected_memories": self.injected_raw.iter().take(50).cloned().collect::<Vec<_>>(),
            "total_tokens_estimate": self.estimate_tokens(),
            "max_context_tokens": self.config.max_context_tokens,
            "config": {
                "retrieval_count": self.config.retrieval_count,
                "max_context_tokens": self.config.max_context_tokens,
                "decay_factor": self.config.decay_factor,
                "relevance_threshold": self.config.relevance_threshold,
            },
        })
    }

    fn trim_if_needed(&mut self) {
        let mut dropped = 0usize;
        while self.estimate_tokens() > self.config.max_context_tokens && self.messages.len() > 2 {
            self.messages.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, remaining = self.messages.len(), "context trimmed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_for_llm_puts_system_first() {
        let mut wm = WorkingMemory::new();
        wm.set_system_prompt("You are the agent.");
        wm.add_message("user", "hello");
        wm.add_message("assistant", "hi");

        let msgs = wm.messages_for_llm();
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[0].content, "You are the agent.");
        assert_eq!(msgs[1].content, "hello");
    }

    #[test]
    fn injected_memories_appended_to_system() {
        let mut wm = WorkingMemory::new();
        wm.set_system_prompt("Base prompt.");
        wm.inject_memories(
            vec!["fact one".into(), "fact two".into()],
            vec![json!({"content": "fact one"})],
        );
        let msgs = wm.messages_for_llm();
        assert!(msgs[0].content.contains("## RELEVANT MEMORIES"));
        assert!(msgs[0].content.contains("- fact one"));
        assert!(msgs[0].content.contains("- fact two"));
        assert_eq!(wm.injected_count(), 2);
    }

    #[test]
    fn token_estimate_is_chars_over_four() {
        let mut wm = WorkingMemory::new();
        wm.set_system_prompt("x".repeat(400));
        wm.add_message("user", &"y".repeat(400));
        assert_eq!(wm.estimate_tokens(), 200);
    }

    #[test]
    fn trim_drops_oldest_first() {
        let mut wm = WorkingMemory::new();
        wm.update_config(&MemoryConfigUpdate {
            max_context_tokens: Some(1_000.0),
            ..Default::default()
        });
        // Each message is ~250 estimated tokens; five of them overflow
        // the 1000-token budget.
        for i in 0..5 {
            wm.add_message("user", &format!("{i}{}", "z".repeat(999)));
        }
        assert!(wm.estimate_tokens() <= 1_000);
        let msgs = wm.messages_for_llm();
        // The oldest messages were dropped, the newest survives.
        assert!(msgs.last().unwrap().content.starts_with('4'));
        assert!(!msgs.iter().any(|m| m.content.starts_with('0')));
    }

    #[test]
    fn trim_always_keeps_two_messages() {
        let mut wm = WorkingMemory::new();
        wm.update_config(&MemoryConfigUpdate {
            max_context_tokens: Some(1_000.0),
            ..Default::default()
        });
        wm.add_message("user", &"a".repeat(10_000));
        wm.add_message("assistant", &"b".repeat(10_000));
        // Over budget, but the invariant allows <= 2 messages instead.
        assert_eq!(wm.message_count(), 2);
    }

    #[test]
    fn compress_keeps_last_two_plus_summary() {
        let mut wm = WorkingMemory::new();
        for i in 0..6 {
            wm.add_message("user", &format!("message {i}"));
        }
        wm.summarize_and_compress("six messages happened");
        assert_eq!(wm.message_count(), 3);
        let msgs = wm.messages_for_llm();
        // msgs[0] is the system prompt; the summary follows.
        assert!(msgs[1].content.contains("six messages happened"));
        assert_eq!(msgs[2].content, "message 4");
        assert_eq!(msgs[3].content, "message 5");
    }

    #[test]
    fn compress_noop_on_short_window() {
        let mut wm = WorkingMemory::new();
        wm.add_message("user", "only one");
        wm.summarize_and_compress("nothing to do");
        assert_eq!(wm.message_count(), 1);
    }

    #[test]
    fn clear_resets_window_and_injections() {
        let mut wm = WorkingMemory::new();
        wm.add_message("user", "x");
        wm.inject_memories(vec!["m".into()], vec![]);
        wm.clear();
        assert_eq!(wm.message_count(), 0);
        assert_eq!(wm.injected_count(), 0);
    }

    // ── config clamping ────────────────────────────────────────────────

    #[test]
    fn config_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.retrieval_count, 10);
        assert_eq!(config.max_context_tokens, 120_000);
        assert_eq!(config.decay_factor, 0.95);
        assert_eq!(config.relevance_threshold, 0.0);
    }

    #[test]
    fn config_clamps_out_of_range_values() {
        let mut config = MemoryConfig::default();
        config.apply(&MemoryConfigUpdate {
            retrieval_count: Some(500.0),
            max_context_tokens: Some(10.0),
            decay_factor: Some(0.1),
            relevance_threshold: Some(3.0),
        });
        assert_eq!(config.retrieval_count, 100);
        assert_eq!(config.max_context_tokens, 1_000);
        assert_eq!(config.decay_factor, 0.5);
        assert_eq!(config.relevance_threshold, 1.0);
    }

    #[test]
    fn config_partial_update_leaves_rest() {
        let mut config = MemoryConfig::default();
        config.apply(&MemoryConfigUpdate {
            retrieval_count: Some(25.0),
            ..Default::default()
        });
        assert_eq!(config.retrieval_count, 25);
        assert_eq!(config.max_context_tokens, 120_000);
    }

    #[test]
    fn snapshot_truncates_long_messages() {
        let mut wm = WorkingMemory::new();
        wm.add_message("user", &"long ".repeat(1000));
        let snap = wm.snapshot();
        let preview = snap["messages"][0]["content"].as_str().unwrap();
        assert!(preview.chars().count() <= 2000);
        assert_eq!(snap["messages"][0]["full_length"], 5000);
    }
}
