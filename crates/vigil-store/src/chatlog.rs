//! Persistent creator-chat history.

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use vigil_types::chat::ChatSource;
use vigil_types::Result;

use crate::db::Database;

/// One stored chat message, either side of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageRow {
    pub timestamp: String,
    /// `"creator"` or `"agent"`.
    pub role: String,
    pub source: String,
    pub content: String,
}

/// Store for the `chat_messages` table.
#[derive(Clone)]
pub struct ChatLog {
    db: Database,
}

impl ChatLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn record_creator(&self, source: ChatSource, content: &str) -> Result<()> {
        self.record("creator", &source.to_string(), content)
    }

    pub fn record_agent(&self, source: ChatSource, content: &str) -> Result<()> {
        self.record("agent", &source.to_string(), content)
    }

    fn record(&self, role: &str, source: &str, content: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO chat_messages (timestamp, role, source, content)
                 VALUES (?1, ?2, ?3, ?4)",
                params![now, role, source, content],
            )
        })?;
        Ok(())
    }

    /// Most recent messages, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<ChatMessageRow>> {
        self.db.with_conn(|c| {
            let mut stmt = c.prepare(
                "SELECT timestamp, role, source, content
                 FROM chat_messages ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(ChatMessageRow {
                    timestamp: row.get(0)?,
                    role: row.get(1)?,
                    source: row.get(2)?,
                    content: row.get(3)?,
                })
            })?;
            rows.collect()
        })
    }
}
