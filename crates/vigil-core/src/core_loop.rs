//! The agent's heartbeat.
//!
//! [`CoreLoop::run`] loops forever: check pause, load state, drain
//! pending chats, plan, execute, journal, feed results back into memory,
//! answer chats, apply plan deltas, run periodic maintenance, broadcast,
//! and sleep until the next wake. Each iteration is independent; an
//! iteration-level failure is journaled and the loop sleeps the default
//! and tries again.
//!
//! Only this task mutates agent state and working memory. Other tasks
//! influence it solely through the chat queue, the wake signal, and the
//! pause flag.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use vigil_memory::{MemoryEntry, VectorMemory};
use vigil_store::chatlog::ChatLog;
use vigil_store::journal::{FileLog, Journal};
use vigil_store::metrics::MetricsStore;
use vigil_store::{BudgetStore, StatePersistor};
use vigil_types::budget::BudgetStatus;
use vigil_types::chat::{ActionSummary, ChatOutcome, ChatSource};
use vigil_types::event::{LoopStatus, StateUpdate};
use vigil_types::plan::Plan;
use vigil_types::tool::ToolResult;
use vigil_types::{Result, VigilError};

use crate::chat::{ChatQueue, PendingChat};
use crate::dispatcher::ToolDispatcher;
use crate::notifier::ChannelNotifier;
use crate::observer::Broadcast;
use crate::planner::Planner;
use crate::wake::WakeSignal;

/// Sleep bounds, in seconds.
pub const MIN_SLEEP_SECONDS: f64 = 10.0;
pub const MAX_SLEEP_SECONDS: f64 = 3600.0;
pub const DEFAULT_SLEEP_SECONDS: f64 = 30.0;

/// With free providers available the agent never hibernates longer than
/// this, even when it asks to.
const FREE_PROVIDER_MAX_SLEEP: f64 = 120.0;

/// Poll interval while paused.
const PAUSED_POLL_SECONDS: f64 = 5.0;

/// Maintenance cadence in iterations.
const MAINTENANCE_EVERY: u64 = 10;
const DEDUP_EVERY: u64 = 50;

/// Recorded-output caps.
const MEMORY_OUTPUT_CHARS: usize = 500;
const MEMORY_ERROR_CHARS: usize = 300;
const CHAT_ACTION_OUTPUT_CHARS: usize = 300;
const CHAT_THINKING_CHARS: usize = 2000;

#[derive(Default, Clone)]
struct CurrentStatus {
    model: String,
    provider: String,
    next_sleep_seconds: f64,
}

/// The persistent iteration loop.
pub struct CoreLoop {
    state: Arc<StatePersistor>,
    planner: Mutex<Planner>,
    dispatcher: Arc<ToolDispatcher>,
    budget: Arc<BudgetStore>,
    vector: Arc<VectorMemory>,
    journal: Arc<Journal>,
    file_log: Arc<FileLog>,
    chat_log: ChatLog,
    metrics: MetricsStore,
    chats: ChatQueue,
    wake: WakeSignal,
    broadcast: Broadcast,
    notifier: parking_lot::RwLock<Option<Arc<dyn ChannelNotifier>>>,
    cancel: CancellationToken,
    current: parking_lot::Mutex<CurrentStatus>,
}

impl CoreLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<StatePersistor>,
        planner: Planner,
        dispatcher: Arc<ToolDispatcher>,
        budget: Arc<BudgetStore>,
        vector: Arc<VectorMemory>,
        journal: Arc<Journal>,
        file_log: Arc<FileLog>,
        chat_log: ChatLog,
        metrics: MetricsStore,
        broadcast: Broadcast,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            state,
            planner: Mutex::new(planner),
            dispatcher,
            budget,
            vector,
            journal,
            file_log,
            chat_log,
            metrics,
            chats: ChatQueue::new(),
            wake: WakeSignal::new(),
            broadcast,
            notifier: parking_lot::RwLock::new(None),
            cancel,
            current: parking_lot::Mutex::new(CurrentStatus::default()),
        }
    }

    // ── control surface ────────────────────────────────────────────────

    /// Interrupt the current sleep.
    pub fn wake(&self) {
        self.wake.wake();
    }

    /// Queue a creator message for the next iteration and wake the loop.
    /// The returned receiver resolves with the iteration's reply.
    pub fn enqueue_chat(
        &self,
        message: String,
        source: ChatSource,
    ) -> tokio::sync::oneshot::Receiver<ChatOutcome> {
        if let Err(e) = self.chat_log.record_creator(source, &message) {
            warn!(error = %e, "failed to persist creator message");
        }
        let rx = self.chats.enqueue(message, source);
        self.wake();
        rx
    }

    /// Pause the loop after the current iteration. Idempotent.
    pub fn pause(&self) -> Result<()> {
        self.state.set_paused(true)
    }

    /// Resume a paused loop and wake it immediately. Idempotent.
    pub fn resume(&self) -> Result<()> {
        self.state.set_paused(false)?;
        self.wake();
        Ok(())
    }

    /// Request shutdown: the loop finishes its current iteration, skips
    /// the next sleep, and exits.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.wake();
    }

    /// Install (or replace) the transport used for pushed chat replies.
    pub fn set_notifier(&self, notifier: Arc<dyn ChannelNotifier>) {
        *self.notifier.write() = Some(notifier);
    }

    /// Subscribe to loop state updates.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<StateUpdate> {
        self.broadcast.subscribe()
    }

    /// Dashboard status summary.
    pub fn status(&self) -> Value {
        let current = self.current.lock().clone();
        let state = self.state.get_state().ok();
        json!({
            "iteration": state.as_ref().map(|s| s.iteration).unwrap_or(0),
            "active_task": state.as_ref().and_then(|s| s.active_task.clone()),
            "paused": state.as_ref().map(|s| s.paused).unwrap_or(false),
            "model": current.model,
            "provider": current.provider,
            "next_wake_seconds": current.next_sleep_seconds,
            "pending_chats": self.chats.len(),
        })
    }

    /// Working-memory snapshot for the dashboard, when the planner is
    /// not mid-plan.
    pub fn working_snapshot(&self) -> Option<Value> {
        self.planner.try_lock().ok().map(|p| p.working_snapshot())
    }

    // ── the loop ───────────────────────────────────────────────────────

    /// Run forever, until [`stop`](Self::stop).
    pub async fn run(&self) {
        info!("core loop starting");

        while !self.cancel.is_cancelled() {
            match self.state.is_paused() {
                Ok(true) => {
                    self.broadcast.emit(StateUpdate::new(LoopStatus::Paused));
                    self.interruptible_sleep(PAUSED_POLL_SECONDS).await;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    self.report_iteration_error(&e);
                    self.interruptible_sleep(DEFAULT_SLEEP_SECONDS).await;
                    continue;
                }
            }

            let sleep_seconds = match self.run_iteration().await {
                Ok(seconds) => seconds,
                Err(e) => {
                    self.report_iteration_error(&e);
                    DEFAULT_SLEEP_SECONDS
                }
            };

            // Shutdown requested mid-iteration: exit before the sleep.
            if self.cancel.is_cancelled() {
                break;
            }
            self.interruptible_sleep(sleep_seconds).await;
        }

        info!("core loop exited");
    }

    async fn interruptible_sleep(&self, seconds: f64) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.wake.sleep(Duration::from_secs_f64(seconds)) => {}
        }
    }

    /// One full iteration. Public so supervisors and tests can drive the
    /// machine step by step. Returns the computed sleep.
    pub async fn run_iteration(&self) -> Result<f64> {
        // 1. Load state, advance the counter, prove liveness.
        let mut state = self.state.get_state()?;
        let iteration = self.state.increment_iteration()?;
        state.iteration = iteration;
        self.state.heartbeat()?;
        info!(iteration, "iteration start");
        self.broadcast
            .emit(StateUpdate::new(LoopStatus::Running).with("iteration", iteration));

        // 2. Budget snapshot.
        let budget_status = self.budget.get_status()?;

        // 3. Drain pending chats atomically.
        let pending = self.chats.drain();
        let creator_messages: Vec<String> = pending.iter().map(|p| p.message.clone()).collect();

        // 4. Plan.
        let tool_names = self.dispatcher.registry().names();
        let planned = {
            let mut planner = self.planner.lock().await;
            match planner
                .plan(&state, &budget_status, &tool_names, &creator_messages)
                .await
            {
                Ok(planned) => planned,
                Err(e) => {
                    // Never leave chat callers hanging on a failed plan.
                    self.fail_pending_chats(pending, &e);
                    return Err(e);
                }
            }
        };
        let plan = &planned.plan;

        let mut plan_meta = Map::new();
        plan_meta.insert("iteration".into(), json!(iteration));
        plan_meta.insert("has_chat".into(), json!(!pending.is_empty()));
        plan_meta.insert("model".into(), json!(planned.model));
        plan_meta.insert("provider".into(), json!(planned.provider));
        plan_meta.insert("tokens".into(), json!(planned.tokens));
        plan_meta.insert("action_count".into(), json!(plan.actions.len()));
        self.journal
            .store("plan", &serde_json::to_string(plan)?, plan_meta)?;
        self.broadcast.emit(
            StateUpdate::new(LoopStatus::Planning)
                .with("status_message", plan.status_message.clone())
                .with(
                    "thinking",
                    plan.thinking.chars().take(200).collect::<String>(),
                ),
        );

        // 5. Execute actions in order.
        let results = self.execute_actions(plan).await;
        if !plan.actions.is_empty() {
            self.broadcast.emit(
                StateUpdate::new(LoopStatus::Executing)
                    .with("actions_count", plan.actions.len())
                    .with("results_count", results.len()),
            );
        }

        // 6. Feed results back into the working context so the next plan
        //    sees what happened.
        if !results.is_empty() {
            let summary = build_results_summary(&results);
            self.planner.lock().await.feed_results(&summary);
        }

        // 7. Write substantive results to long-term memory.
        self.store_results_in_memory(&results).await;

        // 8. Answer pending chats.
        if !pending.is_empty() {
            self.complete_chats(pending, &planned, &results).await;
        }

        // 9. Apply plan deltas.
        if let Some(update) = &plan.goals_update {
            self.state.apply_goals_update(update)?;
        }
        if let Some(delta) = &plan.short_term_memories_update {
            if let Some(replace) = &delta.replace {
                self.state.replace_short_term_memories(replace, iteration)?;
            } else {
                if !delta.remove.is_empty() {
                    self.state.remove_short_term_memories(&delta.remove)?;
                }
                if !delta.add.is_empty() {
                    self.state.add_short_term_memories(&delta.add, iteration)?;
                }
            }
        }
        if let Some(config) = &plan.memory_config {
            self.planner.lock().await.update_memory_config(config);
        }
        self.state.set_active_task(Some(&plan.status_message))?;
        {
            let mut current = self.current.lock();
            current.model = planned.model.clone();
            current.provider = planned.provider.clone();
        }

        // 10. Periodic maintenance.
        if iteration % MAINTENANCE_EVERY == 0 {
            self.run_maintenance(iteration).await;
        }

        // 11. Decide the next sleep and report.
        let sleep_seconds = compute_sleep(plan, &budget_status);
        self.current.lock().next_sleep_seconds = sleep_seconds;

        let mut fields = Map::new();
        fields.insert("iteration".into(), json!(iteration));
        fields.insert("actions".into(), json!(plan.actions.len()));
        fields.insert("results".into(), json!(results.len()));
        fields.insert("budget_remaining".into(), json!(budget_status.remaining));
        fields.insert("next_sleep".into(), json!(sleep_seconds));
        if let Err(e) = self.file_log.log("iteration_complete", fields) {
            warn!(error = %e, "file log write failed");
        }
        if let Err(e) = self.metrics.record("loop_iteration", iteration as f64) {
            warn!(error = %e, "metrics write failed");
        }

        self.broadcast.emit(
            StateUpdate::new(LoopStatus::Idle)
                .with("iteration", iteration)
                .with("status_message", plan.status_message.clone())
                .with("budget", serde_json::to_value(&budget_status)?)
                .with("next_wake_seconds", sleep_seconds)
                .with("model", planned.model.clone())
                .with("provider", planned.provider.clone()),
        );
        info!(
            iteration,
            model = %planned.model,
            provider = %planned.provider,
            actions = plan.actions.len(),
            chat_messages = creator_messages.len(),
            budget_remaining = budget_status.remaining,
            next_sleep = sleep_seconds,
            "iteration complete"
        );

        Ok(sleep_seconds)
    }

    async fn execute_actions(&self, plan: &Plan) -> Vec<(String, ToolResult)> {
        let mut results = Vec::with_capacity(plan.actions.len());
        for (index, action) in plan.actions.iter().enumerate() {
            let mut params = action.parameters.clone();
            // Per-action tier rides along for tools that route LLM calls.
            if let Some(tier) = action.tier {
                if !params.contains_key("tier") {
                    params.insert("tier".into(), json!(tier.to_string()));
                }
            }
            info!(index, tool = %action.tool, "executing action");
            let result = self.dispatcher.execute(&action.tool, params).await;
            if let Some(err) = &result.error {
                warn!(tool = %action.tool, error = %err, "action failed");
            }
            results.push((action.tool.clone(), result));
        }
        results
    }

    async fn store_results_in_memory(&self, results: &[(String, ToolResult)]) {
        for (tool, result) in results {
            if !self.dispatcher.registry().is_substantive(tool) {
                continue;
            }
            let entry = if result.success && !result.output.is_empty() {
                let head: String = result.output.chars().take(MEMORY_OUTPUT_CHARS).collect();
                MemoryEntry::new(format!("[{tool}] {head}"), 0.5, format!("tool:{tool}"))
            } else if let Some(err) = &result.error {
                // Failures are stored with elevated importance so the
                // agent sees its own mistakes next iteration.
                let head: String = err.chars().take(MEMORY_ERROR_CHARS).collect();
                MemoryEntry::new(
                    format!("[{tool} FAILED] {head}"),
                    0.6,
                    format!("tool:{tool}:error"),
                )
            } else {
                continue;
            };
            if let Err(e) = self.vector.add(entry, true).await {
                warn!(tool = %tool, error = %e, "memory write failed");
            }
        }
    }

    async fn complete_chats(
        &self,
        pending: Vec<PendingChat>,
        planned: &vigil_types::plan::PlannedIteration,
        results: &[(String, ToolResult)],
    ) {
        let plan = &planned.plan;
        let action_summaries: Vec<ActionSummary> = results
            .iter()
            .map(|(tool, result)| ActionSummary {
                tool: tool.clone(),
                success: result.success,
                output: result.output.chars().take(CHAT_ACTION_OUTPUT_CHARS).collect(),
            })
            .collect();

        let reply = plan
            .chat_reply
            .clone()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| {
                if plan.thinking.is_empty() {
                    plan.status_message.clone()
                } else {
                    plan.thinking.chars().take(CHAT_THINKING_CHARS).collect()
                }
            });

        let count = pending.len();
        let mut delivered: Vec<(String, ChatSource)> = Vec::with_capacity(count);
        for chat in pending {
            let mut meta = Map::new();
            meta.insert("source".into(), json!(chat.source.to_string()));
            if let Err(e) = self.journal.store("chat_creator", &chat.message, meta) {
                warn!(error = %e, "journal write failed");
            }
            let head: String = chat.message.chars().take(300).collect();
            if let Err(e) = self
                .vector
                .add(
                    MemoryEntry::new(
                        format!("[creator_chat] Creator said: {head}"),
                        0.7,
                        "chat:creator",
                    ),
                    true,
                )
                .await
            {
                warn!(error = %e, "memory write failed");
            }

            delivered.push((chat.message.clone(), chat.source));
            chat.respond(ChatOutcome {
                reply: reply.clone(),
                model: planned.model.clone(),
                provider: planned.provider.clone(),
                tokens: planned.tokens,
                actions: action_summaries.clone(),
            });
        }

        let reply_head: String = reply.chars().take(300).collect();
        if let Err(e) = self
            .vector
            .add(
                MemoryEntry::new(
                    format!("[agent_chat_reply] I replied to creator: {reply_head}"),
                    0.6,
                    "chat:agent",
                ),
                true,
            )
            .await
        {
            warn!(error = %e, "memory write failed");
        }
        if let Err(e) = self.journal.store("chat_reply", &reply, Map::new()) {
            warn!(error = %e, "journal write failed");
        }
        if let Some((_, source)) = delivered.first() {
            if let Err(e) = self.chat_log.record_agent(*source, &reply) {
                warn!(error = %e, "failed to persist agent reply");
            }
        }
        info!(count, "chat replies delivered");

        // Telegram-sourced chats additionally get a pushed reply; voice
        // messages are answered in both voice and text.
        let notifier = self.notifier.read().clone();
        if let Some(notifier) = notifier {
            for (message, source) in &delivered {
                if *source != ChatSource::Telegram {
                    continue;
                }
                let voice = message.contains("[voice]");
                if let Err(e) = notifier.send_reply(&reply, voice).await {
                    warn!(error = %e, "telegram reply failed");
                } else if voice {
                    if let Err(e) = notifier.send_reply(&reply, false).await {
                        warn!(error = %e, "telegram text follow-up failed");
                    }
                }
            }
        }
    }

    async fn run_maintenance(&self, iteration: u64) {
        let decay = self.planner.lock().await.decay_factor();
        if let Err(e) = self.vector.decay_importance(decay) {
            warn!(error = %e, "decay failed");
        }
        let pruned = self.vector.prune_expired().unwrap_or_else(|e| {
            warn!(error = %e, "prune failed");
            0
        });
        let stm_evicted = self.state.maintain_short_term_memories().unwrap_or_else(|e| {
            warn!(error = %e, "scratch pad maintenance failed");
            0
        });
        let mut dedup_removed = 0;
        if iteration % DEDUP_EVERY == 0 {
            dedup_removed = self.vector.deduplicate().unwrap_or_else(|e| {
                warn!(error = %e, "dedup failed");
                0
            });
        }
        info!(
            iteration,
            pruned, stm_evicted, dedup_removed, "maintenance complete"
        );
    }

    fn fail_pending_chats(&self, pending: Vec<PendingChat>, err: &VigilError) {
        for chat in pending {
            chat.respond(ChatOutcome {
                reply: format!("I hit an error this iteration: {err}"),
                model: String::new(),
                provider: String::new(),
                tokens: 0,
                actions: vec![],
            });
        }
    }

    fn report_iteration_error(&self, err: &VigilError) {
        error!(error = %err, "iteration error");
        let mut meta = Map::new();
        meta.insert("error".into(), json!(err.to_string()));
        if let Err(journal_err) = self
            .journal
            .store("error", &format!("Loop error: {err}"), meta)
        {
            warn!(error = %journal_err, "journal write failed");
        }
        self.broadcast.emit(
            StateUpdate::new(LoopStatus::Error).with("error", err.to_string()),
        );
    }
}

/// Decide how long to sleep after an iteration.
///
/// An explicit request is honored within `[10, 3600]`, tightened to
/// `[10, 120]` while free providers exist (an agent with free models has
/// no reason to hibernate). Without a request: near-depleted budget means
/// a long sleep unless free providers keep the agent productive, an
/// action-free iteration slows down, and everything else takes the
/// default.
pub fn compute_sleep(plan: &Plan, budget: &BudgetStatus) -> f64 {
    let has_free = budget.has_free_providers();

    if let Some(requested) = plan.sleep_seconds {
        let effective_max = if has_free {
            FREE_PROVIDER_MAX_SLEEP
        } else {
            MAX_SLEEP_SECONDS
        };
        let actual = requested.clamp(MIN_SLEEP_SECONDS, effective_max);
        if (actual - requested).abs() > f64::EPSILON {
            info!(requested, actual, "requested sleep clamped");
        }
        return actual;
    }

    if budget.remaining <= 1.0 {
        return if has_free { 60.0 } else { MAX_SLEEP_SECONDS };
    }
    if plan.actions.is_empty() {
        return 120.0;
    }
    DEFAULT_SLEEP_SECONDS
}

/// Render executed results as the markdown block fed back to the planner.
fn build_results_summary(results: &[(String, ToolResult)]) -> String {
    let mut lines = vec![format!(
        "**Results from {} action(s) just executed:**\n",
        results.len()
    )];
    for (i, (tool, result)) in results.iter().enumerate() {
        if result.success {
            let head: String = result.output.chars().take(600).collect();
            let shown = if head.is_empty() { "(no output)" } else { &head };
            lines.push(format!("{}. [ok] **{tool}**: {shown}", i + 1));
        } else {
            let err = result.error.as_deref().unwrap_or("(unknown error)");
            let head: String = err.chars().take(300).collect();
            lines.push(format!("{}. [failed] **{tool}** FAILED: {head}", i + 1));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::budget::{BudgetSource, Currency, ProviderStatus, ProviderTier};
    use vigil_types::plan::Action;

    fn budget(remaining: f64, free: bool) -> BudgetStatus {
        let mut providers = vec![ProviderStatus {
            provider: "openai".into(),
            known_balance: Some(remaining),
            spent_tracked: 0.0,
            estimated_remaining: Some(remaining),
            tier: ProviderTier::Paid,
            currency: Currency::Usd,
            notes: String::new(),
            balance_updated_at: None,
        }];
        if free {
            providers.push(ProviderStatus {
                provider: "mistral".into(),
                known_balance: None,
                spent_tracked: 0.0,
                estimated_remaining: None,
                tier: ProviderTier::Free,
                currency: Currency::Usd,
                notes: String::new(),
                balance_updated_at: None,
            });
        }
        BudgetStatus {
            monthly_cap: 100.0,
            spent: 0.0,
            remaining,
            percent_used: 0.0,
            source: BudgetSource::Config,
            providers,
        }
    }

    fn plan_with(sleep: Option<f64>, actions: usize) -> Plan {
        Plan {
            sleep_seconds: sleep,
            actions: (0..actions)
                .map(|i| Action::new(format!("tool_{i}"), Map::new()))
                .collect(),
            ..Default::default()
        }
    }

    // ── compute_sleep ──────────────────────────────────────────────────

    #[test]
    fn explicit_request_honored() {
        let sleep = compute_sleep(&plan_with(Some(30.0), 1), &budget(50.0, false));
        assert_eq!(sleep, 30.0);
    }

    #[test]
    fn request_clamped_to_minimum() {
        let sleep = compute_sleep(&plan_with(Some(2.0), 0), &budget(50.0, false));
        assert_eq!(sleep, MIN_SLEEP_SECONDS);
    }

    #[test]
    fn request_clamped_to_maximum_without_free() {
        let sleep = compute_sleep(&plan_with(Some(90_000.0), 0), &budget(50.0, false));
        assert_eq!(sleep, MAX_SLEEP_SECONDS);
    }

    #[test]
    fn free_providers_cap_requested_hibernation() {
        let sleep = compute_sleep(&plan_with(Some(3600.0), 0), &budget(50.0, true));
        assert_eq!(sleep, 120.0);
    }

    #[test]
    fn depleted_budget_without_free_sleeps_an_hour() {
        let sleep = compute_sleep(&plan_with(None, 0), &budget(0.5, false));
        assert_eq!(sleep, MAX_SLEEP_SECONDS);
    }

    #[test]
    fn depleted_budget_with_free_stays_active() {
        let sleep = compute_sleep(&plan_with(None, 0), &budget(0.5, true));
        assert_eq!(sleep, 60.0);
    }

    #[test]
    fn idle_iteration_slows_down() {
        let sleep = compute_sleep(&plan_with(None, 0), &budget(50.0, false));
        assert_eq!(sleep, 120.0);
    }

    #[test]
    fn busy_iteration_takes_default() {
        let sleep = compute_sleep(&plan_with(None, 2), &budget(50.0, false));
        assert_eq!(sleep, DEFAULT_SLEEP_SECONDS);
    }

    #[test]
    fn computed_sleep_always_in_bounds() {
        for (sleep, actions, remaining, free) in [
            (Some(-5.0), 0, 50.0, false),
            (Some(1e9), 3, 50.0, true),
            (None, 0, 0.0, false),
            (None, 5, 100.0, true),
        ] {
            let s = compute_sleep(&plan_with(sleep, actions), &budget(remaining, free));
            assert!((MIN_SLEEP_SECONDS..=MAX_SLEEP_SECONDS).contains(&s), "{s}");
        }
    }

    // ── results summary ────────────────────────────────────────────────

    #[test]
    fn summary_counts_and_marks_results() {
        let results = vec![
            ("web_search".to_string(), ToolResult::ok("found 3 results")),
            ("file_write".to_string(), ToolResult::fail("disk full")),
        ];
        let summary = build_results_summary(&results);
        assert!(summary.contains("Results from 2 action(s)"));
        assert!(summary.contains("[ok] **web_search**: found 3 results"));
        assert!(summary.contains("[failed] **file_write** FAILED: disk full"));
    }

    #[test]
    fn summary_handles_empty_output() {
        let results = vec![("noop".to_string(), ToolResult::ok(""))];
        let summary = build_results_summary(&results);
        assert!(summary.contains("(no output)"));
    }

    #[test]
    fn summary_truncates_long_output() {
        let results = vec![("big".to_string(), ToolResult::ok("x".repeat(5000)))];
        let summary = build_results_summary(&results);
        assert!(summary.len() < 1000);
    }
}
