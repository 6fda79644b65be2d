//! Persistent tool-usage analytics.
//!
//! Every dispatched tool call lands one row in `tool_usage_log`,
//! independent of the journal, so dashboards can aggregate success rates
//! and latencies without parsing JSONL.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use vigil_types::Result;

use crate::db::Database;

/// One recorded tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolUsageEntry {
    pub timestamp: String,
    pub tool_name: String,
    /// Parameter summary (values truncated), JSON-encoded.
    pub parameters: String,
    pub result_summary: Option<String>,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Store for the `tool_usage_log` table.
#[derive(Clone)]
pub struct ToolUsageLog {
    db: Database,
}

impl ToolUsageLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Append one invocation row.
    pub fn record(
        &self,
        tool_name: &str,
        parameters: &str,
        result_summary: Option<&str>,
        success: bool,
        duration_ms: u64,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO tool_usage_log
                   (timestamp, tool_name, parameters, result_summary, success, duration_ms, error)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    now,
                    tool_name,
                    parameters,
                    result_summary,
                    success as i64,
                    duration_ms as i64,
                    error,
                ],
            )
        })?;
        Ok(())
    }

    /// Most recent invocations, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ToolUsageEntry>> {
        self.db.with_conn(|c| {
            let mut stmt = c.prepare(
                "SELECT timestamp, tool_name, parameters, result_summary, success,
                        duration_ms, error
                 FROM tool_usage_log ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(ToolUsageEntry {
                    timestamp: row.get(0)?,
                    tool_name: row.get(1)?,
                    parameters: row.get(2)?,
                    result_summary: row.get(3)?,
                    success: row.get::<_, i64>(4)? != 0,
                    duration_ms: row.get::<_, i64>(5)? as u64,
                    error: row.get(6)?,
                })
            })?;
            rows.collect()
        })
    }
}
