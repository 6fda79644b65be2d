//! The agent state persistor.
//!
//! [`StatePersistor`] is the only component allowed to mutate the
//! singleton `agent_state` row: the directive, the three goal tiers, the
//! scratch pad, pause flag, iteration counter, and heartbeat. Every
//! mutation stamps `last_heartbeat`.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use vigil_types::plan::GoalsUpdate;
use vigil_types::state::{
    AgentState, ShortTermNote, STM_MAX_CONTENT_CHARS, STM_MAX_ENTRIES,
};
use vigil_types::state::truncate_chars;
use vigil_types::{Result, VigilError};

use crate::db::Database;

/// Goals seeded when the agent boots for the first time.
const DEFAULT_SHORT_GOALS: &[&str] = &[
    "Verify provider credentials and confirm chat is responding",
    "Review the tool inventory and note anything misconfigured",
];
const DEFAULT_MID_GOALS: &[&str] = &[
    "Build a reliable picture of available budget across providers",
    "Accumulate useful skills and memories from completed work",
];
const DEFAULT_LONG_GOALS: &[&str] = &[
    "Continuously improve your own capabilities and memory quality",
    "Generate value through work in the world",
];

/// Durable wrapper over the singleton [`AgentState`] row.
#[derive(Clone)]
pub struct StatePersistor {
    db: Database,
    initial_directive: String,
}

impl StatePersistor {
    pub fn new(db: Database, initial_directive: impl Into<String>) -> Self {
        Self {
            db,
            initial_directive: initial_directive.into(),
        }
    }

    /// Load the state row, creating and seeding it on first boot.
    pub fn load_or_create(&self) -> Result<AgentState> {
        if let Some(state) = self.load()? {
            return Ok(state);
        }

        let now = Utc::now();
        let directive = self.initial_directive.clone();
        let short: Vec<String> = DEFAULT_SHORT_GOALS.iter().map(|s| s.to_string()).collect();
        let mid: Vec<String> = DEFAULT_MID_GOALS.iter().map(|s| s.to_string()).collect();
        let long: Vec<String> = DEFAULT_LONG_GOALS.iter().map(|s| s.to_string()).collect();

        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO agent_state
                   (id, directive, short_term_goals, mid_term_goals, long_term_goals,
                    current_goals, active_task, loop_iteration, is_paused,
                    short_term_memories, started_at, last_heartbeat)
                 VALUES (1, ?1, ?2, ?3, ?4, ?2, NULL, 0, 0, '[]', ?5, ?5)",
                params![
                    directive,
                    serde_json::to_string(&short).unwrap_or_default(),
                    serde_json::to_string(&mid).unwrap_or_default(),
                    serde_json::to_string(&long).unwrap_or_default(),
                    now.to_rfc3339(),
                ],
            )
        })?;
        info!(directive = %truncate_chars(&directive, 80), "agent state created");

        self.load()?
            .ok_or_else(|| VigilError::Storage("state row missing after create".into()))
    }

    fn load(&self) -> Result<Option<AgentState>> {
        self.db.with_conn(|c| {
            c.query_row(
                "SELECT directive, short_term_goals, mid_term_goals, long_term_goals,
                        current_goals, active_task, loop_iteration, is_paused,
                        short_term_memories, started_at, last_heartbeat
                 FROM agent_state WHERE id = 1",
                [],
                |row| {
                    Ok(AgentState {
                        directive: row.get(0)?,
                        short_term_goals: json_list(row.get::<_, String>(1)?),
                        mid_term_goals: json_list(row.get::<_, String>(2)?),
                        long_term_goals: json_list(row.get::<_, String>(3)?),
                        current_goals: json_list(row.get::<_, String>(4)?),
                        active_task: row.get(5)?,
                        iteration: row.get::<_, i64>(6)? as u64,
                        paused: row.get::<_, i64>(7)? != 0,
                        short_term_memories: serde_json::from_str(
                            &row.get::<_, String>(8)?,
                        )
                        .unwrap_or_default(),
                        started_at: parse_time(row.get::<_, String>(9)?),
                        last_heartbeat: parse_time(row.get::<_, String>(10)?),
                    })
                },
            )
            .optional()
        })
    }

    /// Current state; creates the row if it does not exist yet.
    pub fn get_state(&self) -> Result<AgentState> {
        self.load_or_create()
    }

    pub fn set_directive(&self, directive: &str) -> Result<()> {
        self.set_field("directive", directive)
    }

    pub fn set_active_task(&self, task: Option<&str>) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "UPDATE agent_state SET active_task = ?1, last_heartbeat = ?2 WHERE id = 1",
                params![task, now],
            )
        })?;
        Ok(())
    }

    /// Apply a goal replacement from the planner. Tiered updates touch
    /// only the tiers they name; a flat list replaces the short-term tier.
    /// `current_goals` mirrors every short-term write.
    pub fn apply_goals_update(&self, update: &GoalsUpdate) -> Result<()> {
        match update {
            GoalsUpdate::Tiered {
                short_term,
                mid_term,
                long_term,
            } => {
                if let Some(short) = short_term {
                    self.set_goal_column("short_term_goals", short)?;
                    self.set_goal_column("current_goals", short)?;
                }
                if let Some(mid) = mid_term {
                    self.set_goal_column("mid_term_goals", mid)?;
                }
                if let Some(long) = long_term {
                    self.set_goal_column("long_term_goals", long)?;
                }
                info!(
                    short = short_term.is_some(),
                    mid = mid_term.is_some(),
                    long = long_term.is_some(),
                    "goals updated"
                );
            }
            GoalsUpdate::Flat(goals) => {
                self.set_goal_column("short_term_goals", goals)?;
                self.set_goal_column("current_goals", goals)?;
                info!(count = goals.len(), "goals replaced (flat)");
            }
        }
        Ok(())
    }

    /// Stamp the heartbeat without changing anything else.
    pub fn heartbeat(&self) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "UPDATE agent_state SET last_heartbeat = ?1 WHERE id = 1",
                params![now],
            )
        })?;
        Ok(())
    }

    /// Bump the iteration counter and return the new value.
    pub fn increment_iteration(&self) -> Result<u64> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "UPDATE agent_state
                 SET loop_iteration = loop_iteration + 1, last_heartbeat = ?1
                 WHERE id = 1",
                params![now],
            )?;
            c.query_row(
                "SELECT loop_iteration FROM agent_state WHERE id = 1",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|i| i as u64)
        })
    }

    pub fn is_paused(&self) -> Result<bool> {
        self.db.with_conn(|c| {
            c.query_row("SELECT is_paused FROM agent_state WHERE id = 1", [], |row| {
                row.get::<_, i64>(0)
            })
            .optional()
            .map(|v| v.unwrap_or(0) != 0)
        })
    }

    pub fn set_paused(&self, paused: bool) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "UPDATE agent_state SET is_paused = ?1, last_heartbeat = ?2 WHERE id = 1",
                params![paused as i64, now],
            )
        })?;
        Ok(())
    }

    // ── Short-term scratch pad ──────────────────────────────────────────

    /// Append notes, truncating content and evicting to stay within the
    /// cap (expired first, then oldest).
    pub fn add_short_term_memories(&self, entries: &[String], iteration: u64) -> Result<()> {
        let mut notes = self.short_term_memories()?;
        for entry in entries {
            notes.push(ShortTermNote::new(entry, iteration));
        }
        let now = Utc::now();
        notes.retain(|n| !n.is_expired(now));
        if notes.len() > STM_MAX_ENTRIES {
            let excess = notes.len() - STM_MAX_ENTRIES;
            notes.drain(..excess);
        }
        let total = notes.len();
        self.write_short_term_memories(&notes)?;
        debug!(added = entries.len(), total, "scratch pad notes added");
        Ok(())
    }

    /// Overwrite the whole scratch pad.
    pub fn replace_short_term_memories(&self, entries: &[String], iteration: u64) -> Result<()> {
        let notes: Vec<ShortTermNote> = entries
            .iter()
            .take(STM_MAX_ENTRIES)
            .map(|e| ShortTermNote::new(e, iteration))
            .collect();
        self.write_short_term_memories(&notes)?;
        debug!(count = notes.len(), "scratch pad replaced");
        Ok(())
    }

    /// Remove notes by index. Indices beyond the pad are ignored.
    pub fn remove_short_term_memories(&self, indices: &[usize]) -> Result<()> {
        let mut notes = self.short_term_memories()?;
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        // Remove back-to-front so earlier indices stay valid.
        for idx in sorted.into_iter().rev() {
            if idx < notes.len() {
                notes.remove(idx);
            }
        }
        self.write_short_term_memories(&notes)
    }

    pub fn clear_short_term_memories(&self) -> Result<()> {
        self.write_short_term_memories(&[])
    }

    /// Evict expired notes and enforce the cap. Returns how many were
    /// evicted.
    pub fn maintain_short_term_memories(&self) -> Result<usize> {
        let notes = self.short_term_memories()?;
        let before = notes.len();
        let now = Utc::now();
        let mut kept: Vec<ShortTermNote> =
            notes.into_iter().filter(|n| !n.is_expired(now)).collect();
        if kept.len() > STM_MAX_ENTRIES {
            let excess = kept.len() - STM_MAX_ENTRIES;
            kept.drain(..excess);
        }
        let evicted = before - kept.len();
        if evicted > 0 {
            self.write_short_term_memories(&kept)?;
            info!(evicted, remaining = kept.len(), "scratch pad maintenance");
        }
        Ok(evicted)
    }

    fn short_term_memories(&self) -> Result<Vec<ShortTermNote>> {
        Ok(self.get_state()?.short_term_memories)
    }

    fn write_short_term_memories(&self, notes: &[ShortTermNote]) -> Result<()> {
        let json = serde_json::to_string(notes)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "UPDATE agent_state
                 SET short_term_memories = ?1, last_heartbeat = ?2
                 WHERE id = 1",
                params![json, now],
            )
        })?;
        Ok(())
    }

    // ── helpers ─────────────────────────────────────────────────────────

    fn set_field(&self, column: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                &format!("UPDATE agent_state SET {column} = ?1, last_heartbeat = ?2 WHERE id = 1"),
                params![value, now],
            )
        })?;
        Ok(())
    }

    fn set_goal_column(&self, column: &str, goals: &[String]) -> Result<()> {
        let json = serde_json::to_string(goals)?;
        self.set_field(column, &json)
    }
}

fn json_list(raw: String) -> Vec<String> {
    serde_json::from_str(&raw).unwrap_or_default()
}

fn parse_time(raw: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
