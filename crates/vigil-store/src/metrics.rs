//! Named metric upserts for the dashboard.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use vigil_types::Result;

use crate::db::Database;

/// Store for the `metrics` table: latest value per metric name.
#[derive(Clone)]
pub struct MetricsStore {
    db: Database,
}

impl MetricsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Set (or overwrite) a metric value.
    pub fn record(&self, name: &str, value: f64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO metrics (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (name) DO UPDATE SET value = ?2, updated_at = ?3",
                params![name, value, now],
            )
        })?;
        Ok(())
    }

    /// Add to a counter metric, creating it at `delta` if absent.
    pub fn increment(&self, name: &str, delta: f64) -> Result<f64> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO metrics (name, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (name) DO UPDATE SET value = value + ?2, updated_at = ?3",
                params![name, delta, now],
            )?;
            c.query_row("SELECT value FROM metrics WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
        })
    }

    pub fn get(&self, name: &str) -> Result<Option<f64>> {
        self.db.with_conn(|c| {
            c.query_row("SELECT value FROM metrics WHERE name = ?1", params![name], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    /// All metrics as (name, value) pairs, sorted by name.
    pub fn all(&self) -> Result<Vec<(String, f64)>> {
        self.db.with_conn(|c| {
            let mut stmt = c.prepare("SELECT name, value FROM metrics ORDER BY name")?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_overwrites() {
        let m = MetricsStore::new(Database::open_in_memory().unwrap());
        m.record("iterations", 1.0).unwrap();
        m.record("iterations", 5.0).unwrap();
        assert_eq!(m.get("iterations").unwrap(), Some(5.0));
    }

    #[test]
    fn increment_accumulates() {
        let m = MetricsStore::new(Database::open_in_memory().unwrap());
        assert_eq!(m.increment("tool_calls", 1.0).unwrap(), 1.0);
        assert_eq!(m.increment("tool_calls", 2.0).unwrap(), 3.0);
    }

    #[test]
    fn missing_metric_is_none() {
        let m = MetricsStore::new(Database::open_in_memory().unwrap());
        assert!(m.get("nope").unwrap().is_none());
    }

    #[test]
    fn all_sorted_by_name() {
        let m = MetricsStore::new(Database::open_in_memory().unwrap());
        m.record("b", 2.0).unwrap();
        m.record("a", 1.0).unwrap();
        let all = m.all().unwrap();
        assert_eq!(all[0].0, "a");
        assert_eq!(all[1].0, "b");
    }
}
