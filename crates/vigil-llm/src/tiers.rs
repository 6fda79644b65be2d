//! The tier chain: which (provider, model) candidates serve each tier.
//!
//! Free candidates appear in every tier so they remain reachable even
//! with zero paid budget; the router additionally sorts them to the
//! front of a tier when money is tight.

use std::collections::HashMap;

use vigil_types::tier::{CostClass, Tier};

/// One candidate inside a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierCandidate {
    pub provider: String,
    pub model: String,
    pub cost: CostClass,
}

impl TierCandidate {
    pub fn new(provider: &str, model: &str, cost: CostClass) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            cost,
        }
    }
}

/// Ordered candidate lists per tier.
#[derive(Debug, Clone, Default)]
pub struct TierChain {
    tiers: HashMap<Tier, Vec<TierCandidate>>,
}

impl TierChain {
    /// An empty chain; useful for tests that build their own.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default chain over the built-in provider fleet.
    pub fn builtin() -> Self {
        use CostClass::{Free, High, Low, Medium};
        let mut chain = Self::new();
        chain.set(
            Tier::Level1,
            vec![
                TierCandidate::new("anthropic", "claude-opus-4-6", High),
                TierCandidate::new("openai", "gpt-5.2", High),
                TierCandidate::new("grok", "grok-4", High),
                TierCandidate::new("mistral", "mistral-large-latest", Free),
            ],
        );
        chain.set(
            Tier::Level2,
            vec![
                TierCandidate::new("anthropic", "claude-sonnet-4-20250514", Medium),
                TierCandidate::new("openai", "gpt-4o", Medium),
                TierCandidate::new("mistral", "mistral-large-latest", Free),
                TierCandidate::new("anthropic", "claude-haiku-35-20241022", Low),
                TierCandidate::new("mistral", "mistral-small-latest", Free),
            ],
        );
        chain.set(
            Tier::Level3,
            vec![
                TierCandidate::new("mistral", "mistral-small-latest", Free),
                TierCandidate::new("openai", "gpt-4o-mini", Low),
                TierCandidate::new("ollama", "mistral:7b-instruct", Free),
            ],
        );
        chain.set(
            Tier::LocalOnly,
            vec![
                TierCandidate::new("mistral", "mistral-small-latest", Free),
                TierCandidate::new("ollama", "mistral:7b-instruct", Free),
            ],
        );
        chain
    }

    /// Replace one tier's candidate list.
    pub fn set(&mut self, tier: Tier, candidates: Vec<TierCandidate>) {
        self.tiers.insert(tier, candidates);
    }

    /// Candidates for a tier, in declared order.
    pub fn candidates(&self, tier: Tier) -> &[TierCandidate] {
        self.tiers.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }
}
