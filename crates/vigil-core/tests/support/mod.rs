//! Shared fixtures for the loop scenario tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use vigil_core::budget_gate::BudgetGate;
use vigil_core::core_loop::CoreLoop;
use vigil_core::dispatcher::ToolDispatcher;
use vigil_core::observer::Broadcast;
use vigil_core::planner::Planner;
use vigil_core::safety::SafetyValidator;
use vigil_core::tools::{Tool, ToolRegistry};
use vigil_llm::error::Result as LlmResult;
use vigil_llm::tiers::{TierCandidate, TierChain};
use vigil_llm::{ChatMessage, LlmResponse, LlmRouter, Provider};
use vigil_memory::{HashEmbedder, VectorMemory};
use vigil_store::chatlog::ChatLog;
use vigil_store::journal::{FileLog, Journal};
use vigil_store::metrics::MetricsStore;
use vigil_store::toollog::ToolUsageLog;
use vigil_store::{BudgetStore, Database, StatePersistor};
use vigil_types::tier::{CostClass, Tier};
use vigil_types::tool::ToolResult;

/// A provider that answers triage calls with one canned response and
/// full-plan calls with another, recording every full-plan request.
pub struct ScriptedProvider {
    triage_response: Mutex<String>,
    plan_response: Mutex<String>,
    fail: bool,
    pub plan_requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(triage: &str, plan: &str) -> Arc<Self> {
        Arc::new(Self {
            triage_response: Mutex::new(triage.to_string()),
            plan_response: Mutex::new(plan.to_string()),
            fail: false,
            plan_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            triage_response: Mutex::new(String::new()),
            plan_response: Mutex::new(String::new()),
            fail: true,
            plan_requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_plan_response(&self, plan: &str) {
        *self.plan_response.lock().unwrap() = plan.to_string();
    }

    /// The user message of the `n`th recorded full-plan request.
    pub fn plan_user_message(&self, n: usize) -> String {
        let requests = self.plan_requests.lock().unwrap();
        requests[n]
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    pub fn plan_request_count(&self) -> usize {
        self.plan_requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }
    fn is_available(&self) -> bool {
        true
    }
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        _temperature: f64,
        _max_tokens: u32,
    ) -> LlmResult<LlmResponse> {
        if self.fail {
            return Err(vigil_llm::ProviderError::RequestFailed(
                "scripted failure".into(),
            ));
        }
        let is_triage = messages
            .first()
            .is_some_and(|m| m.content.contains("task-complexity triage"));
        let content = if is_triage {
            self.triage_response.lock().unwrap().clone()
        } else {
            self.plan_requests
                .lock()
                .unwrap()
                .push(messages.to_vec());
            self.plan_response.lock().unwrap().clone()
        };
        Ok(LlmResponse {
            content,
            model: model.to_string(),
            provider: "scripted".into(),
            input_tokens: 10,
            output_tokens: 5,
            total_tokens: 15,
            finish_reason: Some("stop".into()),
        })
    }
}

/// A registrable tool that records invocations.
pub struct CountingTool {
    name: String,
    substantive: bool,
    calls: AtomicU32,
}

impl CountingTool {
    pub fn named(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            substantive: false,
            calls: AtomicU32::new(0),
        })
    }

    pub fn substantive(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            substantive: true,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        &self.name
    }
    fn description(&self) -> &str {
        "Counts invocations and echoes its text parameter"
    }
    fn substantive(&self) -> bool {
        self.substantive
    }
    fn schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = params
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("(nothing)");
        ToolResult::ok(format!("did: {text}"))
    }
}

/// Everything a scenario needs, wired against one temp directory.
pub struct Harness {
    pub _dir: tempfile::TempDir,
    pub core: Arc<CoreLoop>,
    pub state: Arc<StatePersistor>,
    pub journal: Arc<Journal>,
    pub vector: Arc<VectorMemory>,
    pub budget: Arc<BudgetStore>,
    pub registry: Arc<ToolRegistry>,
    pub cancel: CancellationToken,
}

pub fn harness(provider: Arc<ScriptedProvider>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().to_path_buf();

    let db = Database::open(&data_dir).unwrap();
    let state = Arc::new(StatePersistor::new(db.clone(), "test directive"));
    state.load_or_create().unwrap();
    let budget = Arc::new(BudgetStore::new(db.clone(), 100.0));
    let journal = Arc::new(Journal::open(&data_dir).unwrap());
    let file_log = Arc::new(FileLog::open(&data_dir).unwrap());
    let vector = Arc::new(VectorMemory::in_memory(Arc::new(HashEmbedder::default())));

    // The scripted provider serves every tier as a free candidate.
    let mut chain = TierChain::new();
    for tier in Tier::ORDER {
        chain.set(
            tier,
            vec![TierCandidate::new("scripted", "scripted-model", CostClass::Free)],
        );
    }
    let router = Arc::new(LlmRouter::new(
        vec![provider as Arc<dyn Provider>],
        chain,
        Arc::new(BudgetGate::new(budget.clone())),
    ));

    let registry = Arc::new(ToolRegistry::new());
    let validator = Arc::new(SafetyValidator::new(vec![data_dir.clone()]));
    let dispatcher = Arc::new(ToolDispatcher::new(
        registry.clone(),
        validator,
        journal.clone(),
        ToolUsageLog::new(db.clone()),
    ));
    let planner = Planner::new(router, vector.clone(), data_dir.join("skills"), None);

    let cancel = CancellationToken::new();
    let core = Arc::new(CoreLoop::new(
        state.clone(),
        planner,
        dispatcher,
        budget.clone(),
        vector.clone(),
        journal.clone(),
        file_log,
        ChatLog::new(db.clone()),
        MetricsStore::new(db),
        Broadcast::new(),
        cancel.clone(),
    ));

    Harness {
        _dir: dir,
        core,
        state,
        journal,
        vector,
        budget,
        registry,
        cancel,
    }
}

/// A triage decision that always escalates to a full plan.
pub const TRIAGE_FULL_PLAN: &str =
    r#"{"complexity": "medium", "tier": "level2", "reason": "work to do", "needs_full_plan": true}"#;

/// A triage decision that short-circuits to idle.
pub const TRIAGE_IDLE: &str = r#"{"complexity": "idle", "tier": "level3", "reason": "nothing pending", "needs_full_plan": false, "quick_action": {"sleep_seconds": 45, "status_message": "idle check"}}"#;
