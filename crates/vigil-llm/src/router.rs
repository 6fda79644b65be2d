//! The budget-aware tier router.
//!
//! [`LlmRouter::complete`] turns "answer this at tier X" into an actual
//! response from some provider: it downgrades the tier when the budget
//! says so (never past the caller's floor), walks the chain from the
//! effective tier downward, prefers free candidates when money is tight,
//! skips providers without credentials, gates paid candidates on
//! `can_spend`, and records usage for every response it returns. A
//! candidate failure is a logged warning and a hop to the next
//! candidate, never a hard error; only full exhaustion surfaces.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use vigil_types::tier::Tier;

use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::tiers::TierChain;
use crate::types::{ChatMessage, LlmResponse};

/// Below this many remaining USD the router prefers free candidates.
const PREFER_FREE_BELOW_USD: f64 = 10.0;

/// Minimal cost probe for paid candidates.
const SPEND_PROBE_USD: f64 = 0.01;

/// The router's view of the budget tracker.
///
/// Budget calls are best-effort for the router: implementations swallow
/// storage errors and answer conservatively rather than failing the
/// completion.
#[async_trait]
pub trait BudgetControl: Send + Sync {
    /// The tier the budget can currently sustain.
    async fn recommended_tier(&self) -> Tier;

    /// Whether `estimated_cost` USD can be spent right now.
    async fn can_spend(&self, estimated_cost: f64) -> bool;

    /// Overall remaining USD.
    async fn remaining_usd(&self) -> f64;

    /// Record one successful call. Returns the estimated cost.
    async fn record_usage(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        task: Option<&str>,
    ) -> f64;
}

/// Per-call options for [`LlmRouter::complete`].
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    /// Short label recorded with the usage row.
    pub task: Option<String>,
    /// Floor for budget downgrades: the effective tier never drops below
    /// this.
    pub min_tier: Option<Tier>,
    /// Force free-first candidate ordering regardless of budget.
    pub prefer_free: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 4096,
            task: None,
            min_tier: None,
            prefer_free: false,
        }
    }
}

/// Routes completion requests through the tier chain.
pub struct LlmRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    tiers: TierChain,
    budget: Arc<dyn BudgetControl>,
}

impl LlmRouter {
    pub fn new(
        providers: Vec<Arc<dyn Provider>>,
        tiers: TierChain,
        budget: Arc<dyn BudgetControl>,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            providers,
            tiers,
            budget,
        }
    }

    /// Names of providers that are currently available.
    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .providers
            .values()
            .filter(|p| p.is_available())
            .map(|p| p.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// The tier chain with per-candidate availability, for the status
    /// surface.
    pub fn tier_info(&self) -> serde_json::Value {
        let mut info = serde_json::Map::new();
        for tier in Tier::ORDER {
            let entries: Vec<serde_json::Value> = self
                .tiers
                .candidates(tier)
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "provider": c.provider,
                        "model": c.model,
                        "cost": c.cost,
                        "available": self
                            .providers
                            .get(&c.provider)
                            .is_some_and(|p| p.is_available()),
                    })
                })
                .collect();
            info.insert(tier.to_string(), serde_json::Value::Array(entries));
        }
        serde_json::Value::Object(info)
    }

    /// Complete `messages` at (or below) `tier`.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        tier: Tier,
        options: &CompletionOptions,
    ) -> Result<LlmResponse> {
        let effective = self.effective_tier(tier, options).await;
        let prefer_free = options.prefer_free
            || self.budget.remaining_usd().await < PREFER_FREE_BELOW_USD;

        let mut attempts: Vec<String> = Vec::new();
        for current in effective.walk() {
            let mut candidates = self.tiers.candidates(current).to_vec();
            if prefer_free {
                // Stable: free candidates first, original order otherwise.
                candidates.sort_by_key(|c| !c.cost.is_free());
            }

            for candidate in candidates {
                let Some(provider) = self.providers.get(&candidate.provider) else {
                    continue;
                };
                if !provider.is_available() {
                    continue;
                }
                if !candidate.cost.is_free() && !self.budget.can_spend(SPEND_PROBE_USD).await {
                    warn!(
                        provider = %candidate.provider,
                        model = %candidate.model,
                        "budget exhausted, skipping paid candidate"
                    );
                    continue;
                }

                info!(
                    provider = %candidate.provider,
                    model = %candidate.model,
                    tier = %current,
                    task = options.task.as_deref().unwrap_or(""),
                    prefer_free,
                    "llm request"
                );
                match provider
                    .complete(messages, &candidate.model, options.temperature, options.max_tokens)
                    .await
                {
                    Ok(response) => {
                        let cost = self
                            .budget
                            .record_usage(
                                &candidate.provider,
                                &response.model,
                                response.input_tokens,
                                response.output_tokens,
                                options.task.as_deref(),
                            )
                            .await;
                        info!(
                            provider = %candidate.provider,
                            model = %response.model,
                            tokens = response.total_tokens,
                            cost = format!("{cost:.6}"),
                            "llm response"
                        );
                        return Ok(response);
                    }
                    Err(err) => {
                        warn!(
                            provider = %candidate.provider,
                            model = %candidate.model,
                            error = %err,
                            "provider failed, trying next candidate"
                        );
                        attempts.push(format!(
                            "{}/{}: {err}",
                            candidate.provider, candidate.model
                        ));
                    }
                }
            }
        }

        Err(ProviderError::AllProvidersExhausted { attempts })
    }

    /// Apply the budget recommendation to the requested tier, respecting
    /// the caller's floor.
    async fn effective_tier(&self, requested: Tier, options: &CompletionOptions) -> Tier {
        let recommended = self.budget.recommended_tier().await;
        if !recommended.is_below(requested) {
            return requested;
        }
        match options.min_tier {
            Some(floor) if recommended.is_below(floor) => {
                info!(
                    requested = %requested,
                    recommended = %recommended,
                    clamped_to = %floor,
                    "tier_downgrade_clamped"
                );
                floor
            }
            _ => {
                info!(
                    requested = %requested,
                    actual = %recommended,
                    reason = "budget",
                    "tier_downgraded"
                );
                recommended
            }
        }
    }
}
