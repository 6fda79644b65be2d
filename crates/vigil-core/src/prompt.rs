//! The planner's system prompt.
//!
//! Assembled fresh every full-planning iteration from the live state:
//! immutable rules first, then identity, directive, the three goal
//! tiers, budget, tools, skills, credentials, the operating protocols,
//! and the strict JSON response contract.

use std::path::Path;

use vigil_types::budget::BudgetStatus;
use vigil_types::state::AgentState;

use crate::safety::rules_prompt_section;

/// A skill file discovered under the skills directory.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillEntry {
    /// File stem, e.g. `email-drafting`.
    pub name: String,
    /// First markdown heading, or the stem when there is none.
    pub title: String,
}

/// Discover `*.md` skill files, sorted by name.
pub fn list_skills(dir: &Path) -> Vec<SkillEntry> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut skills: Vec<SkillEntry> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .filter_map(|path| {
            let name = path.file_stem()?.to_string_lossy().to_string();
            let title = std::fs::read_to_string(&path)
                .ok()
                .and_then(|content| {
                    content
                        .lines()
                        .find(|l| l.starts_with('#'))
                        .map(|l| l.trim_start_matches('#').trim().to_string())
                })
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| name.clone());
            Some(SkillEntry { name, title })
        })
        .collect();
    skills.sort_by(|a, b| a.name.cmp(&b.name));
    skills
}

/// Build the full-planning system prompt.
pub fn build_system_prompt(
    state: &AgentState,
    budget: &BudgetStatus,
    tool_names: &[String],
    skills: &[SkillEntry],
    credentials: &[(String, String)],
) -> String {
    let mut sections: Vec<String> = Vec::new();

    sections.push(rules_prompt_section());

    sections.push(
        "## YOUR IDENTITY\n\
         You are vigil, an autonomous agent running a persistent iteration loop. \
         Each iteration you observe your state, plan, act through tools, and choose \
         when to wake next. You exist continuously; your memory layers (working, \
         short-term, long-term vector) are how you persist across iterations."
            .to_string(),
    );

    sections.push(format!("## MODIFIABLE DIRECTIVE\n{}", state.directive));

    if !state.long_term_goals.is_empty() {
        sections.push(format!(
            "## LONG-TERM GOALS (strategic, ongoing)\n{}",
            bullet_list(&state.long_term_goals)
        ));
    }
    if !state.mid_term_goals.is_empty() {
        sections.push(format!(
            "## MID-TERM GOALS (projects, weeks-scale)\n{}",
            bullet_list(&state.mid_term_goals)
        ));
    }
    let short = state.effective_short_term_goals();
    if !short.is_empty() {
        sections.push(format!(
            "## SHORT-TERM GOALS (immediate, this iteration or the next few)\n{}",
            bullet_list(short)
        ));
    }

    sections.push(budget_section(budget));

    sections.push(format!("## AVAILABLE TOOLS\n{}", tool_names.join(", ")));

    if !skills.is_empty() {
        let lines: Vec<String> = skills
            .iter()
            .map(|s| format!("- {} ({})", s.title, s.name))
            .collect();
        sections.push(format!(
            "## SKILLS (reusable knowledge and patterns)\n{}",
            lines.join("\n")
        ));
    }

    if !credentials.is_empty() {
        let lines: Vec<String> = credentials
            .iter()
            .map(|(key, masked)| format!("- {key} = {masked}"))
            .collect();
        sections.push(format!(
            "## CONFIGURED CREDENTIALS (values masked)\n{}",
            lines.join("\n")
        ));
    }

    sections.push(
        "## PACING & SLEEP CONTROL\n\
         Set `sleep_seconds` (10-3600) to choose when you wake next. Sleep briefly \
         when you have momentum, longer when waiting on the world. With free \
         providers available, long hibernation is never necessary: you can stay \
         productive at zero cost."
            .to_string(),
    );

    sections.push(
        "## MEMORY CONTROL\n\
         Relevant long-term memories are injected into this prompt each iteration. \
         Tune retrieval with `memory_config`: retrieval_count (1-100), \
         relevance_threshold (0-1), decay_factor (0.5-1), max_context_tokens. \
         Use the memory tools to write facts worth keeping and to search what you \
         already know."
            .to_string(),
    );

    sections.push(
        "## SHORT-TERM MEMORIES (scratch pad)\n\
         Your scratch pad holds up to 50 operational notes that expire after 48 \
         hours. Manage it with `short_term_memories_update`: {\"add\": [...]} to \
         append, {\"remove\": [indices]} to drop, {\"replace\": [...]} to \
         overwrite. Use it for in-flight work state, not durable knowledge."
            .to_string(),
    );

    sections.push(
        "## MODEL ROUTING & COST CONTROL\n\
         Each action may carry a `tier` (level1 strongest, level2, level3) \
         controlling which model handles tools that think. The router downgrades \
         automatically when budget is tight and falls back through providers on \
         failure. Free providers are always reachable; low paid budget is never a \
         reason to stop working."
            .to_string(),
    );

    sections.push(
        "## CREATOR CHAT\n\
         When your creator sends a message you MUST answer it in `chat_reply`, in \
         the same iteration, honestly and specifically. You may also take actions \
         they asked for. Never hide anything from your creator."
            .to_string(),
    );

    sections.push(
        "## RESPONSE FORMAT\n\
         Respond with ONLY a JSON object (no surrounding prose):\n\
         {\n\
           \"thinking\": \"your reasoning\",\n\
           \"actions\": [{\"tool\": \"name\", \"parameters\": {...}, \"tier\": \"level2\"}],\n\
           \"goals_update\": {\"short_term\": [...], \"mid_term\": [...], \"long_term\": [...]},\n\
           \"short_term_memories_update\": {\"add\": [...], \"remove\": [...], \"replace\": [...]},\n\
           \"memory_config\": {\"retrieval_count\": 10},\n\
           \"sleep_seconds\": 30,\n\
           \"chat_reply\": \"required when the creator wrote to you\",\n\
           \"status_message\": \"short dashboard line\"\n\
         }\n\
         Every field except `thinking`, `actions`, and `status_message` is \
         optional. Actions execute in order; omit `actions` entirely to take none."
            .to_string(),
    );

    sections.join("\n\n")
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn budget_section(budget: &BudgetStatus) -> String {
    let mut out = format!(
        "## BUDGET STATUS\nRemaining: ${:.2} of ${:.2} ({:.0}% used)\nPer provider:",
        budget.remaining, budget.monthly_cap, budget.percent_used
    );
    for p in &budget.providers {
        let remaining = match p.estimated_remaining {
            Some(est) => format!("{est:.2} {}", p.currency.code()),
            None => "unknown".to_string(),
        };
        out.push_str(&format!(
            "\n- {} [{}]: {} remaining",
            p.provider,
            match p.tier {
                vigil_types::budget::ProviderTier::Paid => "paid",
                vigil_types::budget::ProviderTier::Free => "free",
                vigil_types::budget::ProviderTier::Unknown => "unknown",
            },
            remaining
        ));
    }
    out
}
