//! Tier selection: which chain position actually serves each kind of
//! planning call. Distinct providers per tier make the choice observable.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use vigil_core::planner::Planner;
use vigil_llm::error::Result as LlmResult;
use vigil_llm::router::BudgetControl;
use vigil_llm::tiers::{TierCandidate, TierChain};
use vigil_llm::{ChatMessage, LlmResponse, LlmRouter, Provider};
use vigil_memory::{HashEmbedder, VectorMemory};
use vigil_types::budget::{BudgetSource, BudgetStatus};
use vigil_types::state::AgentState;
use vigil_types::tier::{CostClass, Tier};

/// Serves a fixed response and counts calls.
struct TierProvider {
    name: String,
    response: String,
    calls: AtomicU32,
}

impl TierProvider {
    fn new(name: &str, response: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            response: response.into(),
            calls: AtomicU32::new(0),
        })
    }

    fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for TierProvider {
    fn name(&self) -> &str {
        &self.name
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn complete(
        &self,
        _messages: &[ChatMessage],
        model: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> LlmResult<LlmResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse {
            content: self.response.clone(),
            model: model.to_string(),
            provider: self.name.clone(),
            input_tokens: 5,
            output_tokens: 5,
            total_tokens: 10,
            finish_reason: Some("stop".into()),
        })
    }
}

/// Budget stub that never constrains anything.
struct OpenBudget;

#[async_trait]
impl BudgetControl for OpenBudget {
    async fn recommended_tier(&self) -> Tier {
        Tier::Level1
    }
    async fn can_spend(&self, _estimated_cost: f64) -> bool {
        true
    }
    async fn remaining_usd(&self) -> f64 {
        100.0
    }
    async fn record_usage(
        &self,
        _provider: &str,
        _model: &str,
        _input_tokens: u64,
        _output_tokens: u64,
        _task: Option<&str>,
    ) -> f64 {
        0.0
    }
}

const IDLE_TRIAGE: &str = r#"{"complexity": "idle", "tier": "level3", "reason": "quiet", "needs_full_plan": false, "quick_action": {"sleep_seconds": 30, "status_message": "idle"}}"#;
const EMPTY_PLAN: &str = r#"{"thinking": "nothing to do", "actions": [], "status_message": "done"}"#;

fn state() -> AgentState {
    AgentState {
        directive: "test".into(),
        short_term_goals: vec!["a goal".into()],
        mid_term_goals: vec![],
        long_term_goals: vec![],
        current_goals: vec![],
        active_task: None,
        iteration: 1,
        paused: false,
        short_term_memories: vec![],
        started_at: Utc::now(),
        last_heartbeat: Utc::now(),
    }
}

fn budget() -> BudgetStatus {
    BudgetStatus {
        monthly_cap: 100.0,
        spent: 0.0,
        remaining: 100.0,
        percent_used: 0.0,
        source: BudgetSource::Config,
        providers: vec![],
    }
}

struct Setup {
    planner: Planner,
    strong: Arc<TierProvider>,
    mid: Arc<TierProvider>,
    cheap: Arc<TierProvider>,
    _dir: tempfile::TempDir,
}

/// Level1 -> "strong", Level2 -> "mid", Level3 -> "cheap". The cheap
/// provider also answers triage with an idle short-circuit.
fn setup() -> Setup {
    let strong = TierProvider::new("strong", EMPTY_PLAN);
    let mid = TierProvider::new("mid", EMPTY_PLAN);
    let cheap = TierProvider::new("cheap", IDLE_TRIAGE);

    let mut chain = TierChain::new();
    chain.set(
        Tier::Level1,
        vec![TierCandidate::new("strong", "m-strong", CostClass::High)],
    );
    chain.set(
        Tier::Level2,
        vec![TierCandidate::new("mid", "m-mid", CostClass::Medium)],
    );
    chain.set(
        Tier::Level3,
        vec![TierCandidate::new("cheap", "m-cheap", CostClass::Free)],
    );

    let router = Arc::new(LlmRouter::new(
        vec![
            strong.clone() as Arc<dyn Provider>,
            mid.clone() as Arc<dyn Provider>,
            cheap.clone() as Arc<dyn Provider>,
        ],
        chain,
        Arc::new(OpenBudget),
    ));
    let dir = tempfile::tempdir().unwrap();
    let vector = Arc::new(VectorMemory::in_memory(Arc::new(HashEmbedder::default())));
    let planner = Planner::new(router, vector, dir.path().join("skills"), None);

    Setup {
        planner,
        strong,
        mid,
        cheap,
        _dir: dir,
    }
}

#[tokio::test]
async fn triage_runs_on_the_cheap_tier() {
    let mut s = setup();
    let planned = s
        .planner
        .plan(&state(), &budget(), &[], &[])
        .await
        .unwrap();

    // Triage hit level3 only; the idle short-circuit skipped the full plan.
    assert_eq!(s.cheap.call_count(), 1);
    assert_eq!(s.strong.call_count(), 0);
    assert_eq!(s.mid.call_count(), 0);
    assert_eq!(planned.model, "triage-only");
}

#[tokio::test]
async fn forced_escalation_plans_on_the_free_tier() {
    let mut s = setup();
    // Four idle iterations: triage only.
    for _ in 0..4 {
        s.planner.plan(&state(), &budget(), &[], &[]).await.unwrap();
    }
    assert_eq!(s.cheap.call_count(), 4);

    // The fifth forces a full plan, still on the cheap (level3) chain:
    // one triage call plus one planning call, nothing stronger.
    let planned = s.planner.plan(&state(), &budget(), &[], &[]).await.unwrap();
    assert_eq!(s.cheap.call_count(), 6);
    assert_eq!(s.strong.call_count(), 0);
    assert_eq!(s.mid.call_count(), 0);
    assert_eq!(planned.provider, "cheap");
}

#[tokio::test]
async fn creator_chat_plans_on_the_strongest_tier() {
    let mut s = setup();
    let planned = s
        .planner
        .plan(&state(), &budget(), &[], &["hello there".to_string()])
        .await
        .unwrap();

    // No triage call at all; the plan came from level1.
    assert_eq!(s.cheap.call_count(), 0);
    assert_eq!(s.strong.call_count(), 1);
    assert_eq!(planned.provider, "strong");
    assert_eq!(planned.triage.tier, Tier::Level1);
}
