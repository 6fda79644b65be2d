//! Adapter from the durable [`BudgetStore`] to the router's
//! [`BudgetControl`] seam.
//!
//! Budget calls are best-effort from the router's perspective: a storage
//! error answers conservatively (weak tier, no spend) instead of failing
//! the completion, and failed usage recording is logged but never blocks
//! a response that was already produced.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use vigil_llm::router::BudgetControl;
use vigil_store::BudgetStore;
use vigil_types::tier::Tier;

/// [`BudgetControl`] over the SQLite-backed budget ledger.
pub struct BudgetGate {
    store: Arc<BudgetStore>,
}

impl BudgetGate {
    pub fn new(store: Arc<BudgetStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BudgetControl for BudgetGate {
    async fn recommended_tier(&self) -> Tier {
        match self.store.recommended_tier() {
            Ok(tier) => tier,
            Err(e) => {
                warn!(error = %e, "budget read failed, recommending level3");
                Tier::Level3
            }
        }
    }

    async fn can_spend(&self, estimated_cost: f64) -> bool {
        match self.store.can_spend(estimated_cost) {
            Ok(ok) => ok,
            Err(e) => {
                warn!(error = %e, "budget read failed, refusing spend");
                false
            }
        }
    }

    async fn remaining_usd(&self) -> f64 {
        match self.store.get_status() {
            Ok(status) => status.remaining,
            Err(e) => {
                warn!(error = %e, "budget read failed, assuming zero remaining");
                0.0
            }
        }
    }

    async fn record_usage(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        task: Option<&str>,
    ) -> f64 {
        match self
            .store
            .record_usage(provider, model, input_tokens, output_tokens, task)
        {
            Ok(cost) => cost,
            Err(e) => {
                warn!(provider, model, error = %e, "usage recording failed");
                0.0
            }
        }
    }
}
