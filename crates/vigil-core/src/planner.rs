//! The two-phase planner.
//!
//! Phase one sends a compact situational summary to a cheap model and
//! asks only "how hard is this iteration, and which tier should plan
//! it?". Phase two, when needed, builds the full system prompt, injects
//! relevant memories, and asks the chosen tier for a complete [`Plan`].
//! Creator chat skips triage entirely and always plans at the strongest
//! tier.
//!
//! The planner also owns the repair layer that turns almost-JSON model
//! output into a typed plan, and the loop detector that warns the agent
//! when it keeps producing the same actions.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use vigil_llm::router::CompletionOptions;
use vigil_llm::{ChatMessage, LlmRouter};
use vigil_memory::{VectorMemory, WorkingMemory};
use vigil_store::SecretsStore;
use vigil_types::budget::BudgetStatus;
use vigil_types::plan::{Plan, PlannedIteration, TriageDecision};
use vigil_types::state::{AgentState, STM_MAX_ENTRIES};
use vigil_types::tier::Tier;
use vigil_types::{Result, VigilError};

use crate::prompt;

/// Ring-buffer size for action signatures.
const SIG_HISTORY: usize = 10;
/// Identical signatures in a row that count as a stuck loop.
const REPEAT_THRESHOLD: usize = 3;
/// Idle (`no_actions`) iterations out of the last five that count as an
/// idle loop.
const IDLE_THRESHOLD: usize = 4;
/// Triage-only iterations before a full plan is forced.
const FORCED_ESCALATION_AFTER: u32 = 5;

/// System prompt for the triage call. Kept minimal to save tokens on
/// the cheap model.
const TRIAGE_SYSTEM_PROMPT: &str = "\
You are a task-complexity triage system for an autonomous AI agent.
Assess the current situation and decide what level of intelligence the next
planning step needs.

Respond with ONLY a JSON object:
{
  \"complexity\": \"idle|low|medium|high\",
  \"tier\": \"level3|level2|level1\",
  \"reason\": \"one sentence why\",
  \"needs_full_plan\": true/false,
  \"quick_action\": null or {\"sleep_seconds\": N, \"status_message\": \"...\"}
}

Guidelines:
- \"low\" / level3: routine checks and simple tool calls; a small model suffices.
- \"medium\" / level2: research, file edits, multi-step plans; needs a capable model.
- \"high\" / level1: complex reasoning, architecture, creator chat, coding tasks,
  self-modification; needs the best model.

ALWAYS escalate to \"high\" / level1 when there is a creator chat message, when
self-modification or deployment is involved, when complex multi-step coding is
required, or when strategy and goals need revision.

BUDGET RULES:
- The agent has FREE providers that cost nothing. Paid budget percentage does
  NOT matter while free providers exist.
- Never answer \"idle\" or needs_full_plan=false just because paid budget looks
  low.
- If there are active goals or tasks, set needs_full_plan=true so the agent can
  work on them. Only answer needs_full_plan=false when goals are genuinely
  empty and nothing is pending.
- Quick-action sleeps should be short (30-60s), not hibernation.";

/// Two-phase planner: cheap triage, then conditional escalation.
pub struct Planner {
    router: Arc<LlmRouter>,
    vector: Arc<VectorMemory>,
    working: WorkingMemory,
    skills_dir: PathBuf,
    secrets: Option<Arc<SecretsStore>>,
    recent_sigs: VecDeque<String>,
    consecutive_triage_only: u32,
    last_results_summary: String,
}

impl Planner {
    pub fn new(
        router: Arc<LlmRouter>,
        vector: Arc<VectorMemory>,
        skills_dir: PathBuf,
        secrets: Option<Arc<SecretsStore>>,
    ) -> Self {
        Self {
            router,
            vector,
            working: WorkingMemory::new(),
            skills_dir,
            secrets,
            recent_sigs: VecDeque::with_capacity(SIG_HISTORY),
            consecutive_triage_only: 0,
            last_results_summary: String::new(),
        }
    }

    /// Produce the plan for one iteration.
    pub async fn plan(
        &mut self,
        state: &AgentState,
        budget: &BudgetStatus,
        tool_names: &[String],
        creator_messages: &[String],
    ) -> Result<PlannedIteration> {
        let has_chat = !creator_messages.is_empty();

        let mut triage = if has_chat {
            info!(reason = "creator_chat", tier = "level1", "triage skipped");
            TriageDecision::for_creator_chat()
        } else {
            let triage = self.triage(state, budget).await;
            info!(
                complexity = ?triage.complexity,
                tier = %triage.tier,
                needs_full_plan = triage.needs_full_plan,
                reason = %triage.reason,
                "triage result"
            );
            triage
        };

        if !triage.needs_full_plan {
            self.consecutive_triage_only += 1;
            if self.consecutive_triage_only >= FORCED_ESCALATION_AFTER {
                // Idle long enough: force a real self-assessment on a free
                // tier so the agent rediscovers work instead of sleeping
                // forever.
                info!(
                    consecutive_triage_only = self.consecutive_triage_only,
                    "forced escalation to full plan"
                );
                self.consecutive_triage_only = 0;
                triage.complexity = vigil_types::plan::Complexity::Medium;
                triage.tier = Tier::Level3;
                triage.needs_full_plan = true;
                triage.reason = format!(
                    "Forced periodic assessment after {FORCED_ESCALATION_AFTER} idle \
                     iterations; review goals and find productive work"
                );
            } else {
                let quick = triage.quick_action.clone().unwrap_or_default();
                let plan = Plan {
                    thinking: format!("[triage] {}", triage.reason),
                    sleep_seconds: Some(quick.sleep_seconds.unwrap_or(60.0)),
                    status_message: quick
                        .status_message
                        .unwrap_or_else(|| "Idle - checking for work".to_string()),
                    ..Default::default()
                };
                info!(sleep = ?plan.sleep_seconds, "plan from triage");
                return Ok(PlannedIteration {
                    plan,
                    triage,
                    model: "triage-only".into(),
                    provider: "triage-only".into(),
                    tokens: 0,
                });
            }
        }

        self.consecutive_triage_only = 0;
        self.full_plan(state, budget, tool_names, creator_messages, triage)
            .await
    }

    /// Feed the previous iteration's execution results back into the
    /// rolling context.
    pub fn feed_results(&mut self, summary: &str) {
        self.working.add_message("user", summary);
        self.last_results_summary = summary.chars().take(500).collect();
    }

    /// Apply a planner-requested retrieval-tuning update.
    pub fn update_memory_config(&mut self, update: &vigil_types::plan::MemoryConfigUpdate) {
        self.working.update_config(update);
    }

    /// Current importance-decay factor, used by the maintenance pass.
    pub fn decay_factor(&self) -> f64 {
        self.working.config().decay_factor
    }

    /// Dashboard view of the working context, including the last
    /// iteration's result summary.
    pub fn working_snapshot(&self) -> Value {
        let mut snapshot = self.working.snapshot();
        snapshot["last_results_summary"] = Value::String(self.last_results_summary.clone());
        snapshot
    }

    // ── phase 1 ────────────────────────────────────────────────────────

    async fn triage(&self, state: &AgentState, budget: &BudgetStatus) -> TriageDecision {
        let short_goals = state.effective_short_term_goals();
        let goals_json =
            serde_json::to_string(&short_goals[..short_goals.len().min(5)]).unwrap_or_default();
        let message = format!(
            "Iteration #{}. Budget: ${:.2} remaining ({:.0}% used). Active task: {}. \
             Short-term goals: {goals_json}. No creator chat this iteration. \
             Assess complexity and decide which tier model should handle planning.",
            state.iteration,
            budget.remaining,
            budget.percent_used,
            state.active_task.as_deref().unwrap_or("None"),
        );
        let messages = vec![
            ChatMessage::system(TRIAGE_SYSTEM_PROMPT),
            ChatMessage::user(message),
        ];

        let options = CompletionOptions {
            temperature: 0.2,
            max_tokens: 256,
            task: Some("triage".into()),
            ..Default::default()
        };
        match self.router.complete(&messages, Tier::Level3, &options).await {
            Ok(response) => match parse_json_object(&response.content)
                .and_then(|value| serde_json::from_value::<TriageDecision>(value).ok())
            {
                Some(triage) => triage,
                None => TriageDecision::fallback("triage parse incomplete"),
            },
            Err(e) => {
                warn!(error = %e, "triage failed");
                TriageDecision::fallback(format!("triage error: {e}"))
            }
        }
    }

    // ── phase 2 ────────────────────────────────────────────────────────

    async fn full_plan(
        &mut self,
        state: &AgentState,
        budget: &BudgetStatus,
        tool_names: &[String],
        creator_messages: &[String],
        triage: TriageDecision,
    ) -> Result<PlannedIteration> {
        let skills = prompt::list_skills(&self.skills_dir);
        let credentials = self
            .secrets
            .as_ref()
            .and_then(|s| s.list_masked().ok())
            .unwrap_or_default();
        let system_prompt =
            prompt::build_system_prompt(state, budget, tool_names, &skills, &credentials);
        self.working.set_system_prompt(system_prompt);

        self.retrieve_memories(state, creator_messages).await?;

        let iteration_msg = self.build_iteration_message(state, budget, creator_messages, &triage);
        self.working.add_message("user", &iteration_msg);

        let is_chat = !creator_messages.is_empty();
        let messages: Vec<ChatMessage> = self
            .working
            .messages_for_llm()
            .into_iter()
            .map(|m| ChatMessage::new(m.role, m.content))
            .collect();
        let options = CompletionOptions {
            temperature: 0.7,
            max_tokens: 4096,
            task: Some(if is_chat { "chat_iteration" } else { "planning" }.into()),
            // Chat must stay on the strongest tier; autonomous planning
            // never drops below capable models.
            min_tier: Some(if is_chat { Tier::Level1 } else { Tier::Level2 }),
            ..Default::default()
        };

        let response = self
            .router
            .complete(&messages, triage.tier, &options)
            .await
            .map_err(|e| VigilError::Provider(e.to_string()))?;

        let plan = parse_plan(&response.content);
        self.working.add_message("assistant", &response.content);
        self.track_signature(&plan);

        info!(
            tier = %triage.tier,
            model = %response.model,
            actions = plan.actions.len(),
            has_chat_reply = plan.chat_reply.is_some(),
            "plan generated"
        );
        Ok(PlannedIteration {
            plan,
            triage,
            model: response.model,
            provider: response.provider,
            tokens: response.total_tokens,
        })
    }

    async fn retrieve_memories(
        &mut self,
        state: &AgentState,
        creator_messages: &[String],
    ) -> Result<()> {
        let goal_text = state.all_goals().join(" ");
        let active = state.active_task.clone().unwrap_or_default();
        let chat_text = creator_messages.join(" ");
        let query = format!("{goal_text} {active} {chat_text}");
        let query = query.trim();
        if query.is_empty() {
            return Ok(());
        }

        let config = self.working.config().clone();
        let hits = self.vector.search(query, config.retrieval_count).await?;
        let relevant: Vec<_> = hits
            .into_iter()
            .filter(|hit| {
                config.relevance_threshold <= 0.0
                    || (1.0 - hit.distance as f64) >= config.relevance_threshold
            })
            .collect();
        if relevant.is_empty() {
            return Ok(());
        }

        let contents: Vec<String> = relevant.iter().map(|h| h.content.clone()).collect();
        let raw: Vec<Value> = relevant
            .iter()
            .map(|h| {
                serde_json::json!({
                    "id": h.id,
                    "content": h.content,
                    "distance": h.distance,
                    "importance_score": h.importance_score,
                    "source": h.source,
                })
            })
            .collect();
        self.working.inject_memories(contents, raw);
        Ok(())
    }

    fn build_iteration_message(
        &self,
        state: &AgentState,
        budget: &BudgetStatus,
        creator_messages: &[String],
        triage: &TriageDecision,
    ) -> String {
        let config = self.working.config();
        let mut msg = format!(
            "This is iteration #{}. Short-term goals: {}. Mid-term goals: {}. \
             Long-term goals: {}. Active task: {}. Budget remaining: ${:.2} ({:.0}% used). \
             Memory config: retrieval_count={}, threshold={}, decay={}. \
             Memories injected this iteration: {}. \
             Triage assessment: complexity={:?}, reason={}. \
             You are running on tier={} for this iteration. \
             Plan your next actions and use tools to accomplish your goals. \
             You can update goals at any tier with goals_update (short_term, mid_term, \
             long_term), manage your scratch pad with short_term_memories_update, tune \
             memory_config, and set sleep_seconds (10-3600) to control when you wake.",
            state.iteration,
            serde_json::to_string(state.effective_short_term_goals()).unwrap_or_default(),
            serde_json::to_string(&state.mid_term_goals).unwrap_or_default(),
            serde_json::to_string(&state.long_term_goals).unwrap_or_default(),
            state.active_task.as_deref().unwrap_or("None"),
            budget.remaining,
            budget.percent_used,
            config.retrieval_count,
            config.relevance_threshold,
            config.decay_factor,
            self.working.injected_count(),
            triage.complexity,
            triage.reason,
            triage.tier,
        );

        if !state.short_term_memories.is_empty() {
            msg.push_str(&format!(
                "\n\n**SHORT-TERM MEMORIES** ({}/{} slots):\n",
                state.short_term_memories.len(),
                STM_MAX_ENTRIES
            ));
            for (i, note) in state.short_term_memories.iter().enumerate() {
                msg.push_str(&format!("  [{i}] {}\n", note.content));
            }
            msg.push_str(
                "Manage these with short_term_memories_update. Old entries expire after \
                 48h; the pad holds 50.",
            );
        }

        if let Some(warning) = self.stuck_warning() {
            msg.push_str("\n\n**STUCK LOOP DETECTED**: ");
            msg.push_str(&warning);
        }

        if !creator_messages.is_empty() {
            msg.push_str(
                "\n\n**CREATOR CHAT - your creator is talking to you directly. You MUST \
                 include a chat_reply field in your response.**\n",
            );
            for (i, chat) in creator_messages.iter().enumerate() {
                msg.push_str(&format!("\nCreator message {}: {chat}", i + 1));
            }
            msg.push_str(
                "\n\nRespond to the creator in chat_reply (markdown is fine). You can \
                 ALSO take actions if the creator asked you to do something. Be specific \
                 and honest.",
            );
        }

        msg
    }

    // ── loop detection ─────────────────────────────────────────────────

    fn track_signature(&mut self, plan: &Plan) {
        if self.recent_sigs.len() == SIG_HISTORY {
            self.recent_sigs.pop_front();
        }
        self.recent_sigs.push_back(action_signature(plan));
    }

    fn stuck_warning(&self) -> Option<String> {
        let warning = detect_stuck_loop(&self.recent_sigs);
        if warning.is_some() {
            warn!(signatures = ?self.recent_sigs, "stuck loop detected");
        }
        warning
    }
}

/// Signature of a plan's actions: the first five `tool[:path]` tokens
/// joined with `|`, or `no_actions`.
pub fn action_signature(plan: &Plan) -> String {
    if plan.actions.is_empty() {
        return "no_actions".to_string();
    }
    plan.actions
        .iter()
        .take(5)
        .map(|action| match action.path_param() {
            Some(path) => format!("{}:{path}", action.tool),
            None => action.tool.clone(),
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Check the signature history for a stuck or idle loop.
pub fn detect_stuck_loop(sigs: &VecDeque<String>) -> Option<String> {
    if sigs.len() >= REPEAT_THRESHOLD {
        let recent: Vec<&String> = sigs.iter().rev().take(REPEAT_THRESHOLD).collect();
        let first = recent[0];
        if first != "no_actions" && recent.iter().all(|s| *s == first) {
            return Some(format!(
                "You have produced the same action pattern ({first}) for the last \
                 {REPEAT_THRESHOLD} iterations. You are stuck. Stop repeating \
                 yourself and try a different approach: check whether the work is \
                 already done, update your goals to reflect reality, or pick a \
                 different tool. If no progress is possible, sleep long and wait \
                 for creator guidance."
            ));
        }
    }

    let idle_count = sigs
        .iter()
        .rev()
        .take(5)
        .filter(|s| *s == "no_actions")
        .count();
    if idle_count >= IDLE_THRESHOLD {
        return Some(
            "You have taken no actions for 4+ iterations in a row. Do not just \
             sleep: you have free models available. Find something productive - \
             improve your notes, research something useful, build a skill, or \
             work on your goals. If you genuinely have no goals, create some."
                .to_string(),
        );
    }

    None
}

// ── JSON parsing and repair ─────────────────────────────────────────────

/// Parse a model response into a typed [`Plan`], repairing the common
/// failure modes on the way. Never fails: an unparseable response
/// becomes a plan whose `thinking` is the raw content and whose action
/// list is empty.
pub fn parse_plan(content: &str) -> Plan {
    if let Some(value) = parse_json_object(content) {
        if let Ok(plan) = serde_json::from_value::<Plan>(value) {
            return unwrap_nested(plan);
        }
    }
    Plan {
        thinking: content.chars().take(2000).collect(),
        ..Default::default()
    }
}

/// Parse strategies applied in order: raw parse, fence stripping, the
/// outer `{...}` substring, then truncation repair by appending closing
/// characters.
fn parse_json_object(content: &str) -> Option<Value> {
    let cleaned = strip_fences(content);

    if let Some(value) = try_object(&cleaned) {
        return Some(value);
    }

    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}');
    if let Some(end) = end {
        if end > start {
            if let Some(value) = try_object(&cleaned[start..=end]) {
                return Some(value);
            }
        }
    }

    // Truncated output: try the cheap closers the models most often drop.
    let fragment = &cleaned[start..];
    for extra in ["}", "]}", "\"]}"] {
        let candidate = format!("{fragment}{extra}");
        if let Some(value) = try_object(&candidate) {
            warn!(extra_chars = extra, "plan json repaired");
            return Some(value);
        }
    }

    // Last resort: balance whatever brackets (and an unterminated string)
    // the fragment left open.
    let balanced = close_truncated(fragment);
    if balanced != fragment {
        if let Some(value) = try_object(&balanced) {
            warn!("plan json repaired by balancing closers");
            return Some(value);
        }
    }

    None
}

/// Append the closers a truncated fragment is missing: close an
/// unterminated string literal, then unwind the open `{`/`[` stack.
/// String contents are respected, so brackets inside values do not
/// confuse the balance.
fn close_truncated(fragment: &str) -> String {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for c in fragment.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() == Some(&c) {
                    stack.pop();
                }
            }
            _ => {}
        }
    }

    if !in_string && stack.is_empty() {
        return fragment.to_string();
    }
    let mut repaired = fragment.to_string();
    if in_string {
        repaired.push('"');
    }
    for closer in stack.into_iter().rev() {
        repaired.push(closer);
    }
    repaired
}

fn try_object(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if value.is_object() => Some(value),
        _ => None,
    }
}

/// Strip a surrounding markdown code fence (```json ... ``` or plain).
fn strip_fences(content: &str) -> String {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let after_open = match trimmed.find('\n') {
        Some(pos) => &trimmed[pos + 1..],
        None => return trimmed.to_string(),
    };
    let without_close = after_open
        .trim_end()
        .strip_suffix("```")
        .map(str::trim_end)
        .unwrap_or(after_open);
    without_close.to_string()
}

/// Some models wrap the real plan inside the `thinking` field of an
/// outer object. When the outer plan has no actions but its thinking
/// looks like a plan, parse and use the inner one.
fn unwrap_nested(plan: Plan) -> Plan {
    if !plan.actions.is_empty() || !plan.thinking.contains("\"actions\"") {
        return plan;
    }
    let inner = strip_fences(&plan.thinking);
    let parsed = try_object(&inner).or_else(|| {
        let start = inner.find('{')?;
        let end = inner.rfind('}')?;
        if end > start {
            try_object(&inner[start..=end])
        } else {
            None
        }
    });
    if let Some(value) = parsed {
        if let Ok(inner_plan) = serde_json::from_value::<Plan>(value) {
            if !inner_plan.actions.is_empty() {
                info!(
                    inner_actions = inner_plan.actions.len(),
                    "unwrapped nested plan"
                );
                return inner_plan;
            }
        }
    }
    plan
}
