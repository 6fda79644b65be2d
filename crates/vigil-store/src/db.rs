//! SQLite connection management and schema migration.
//!
//! One [`Database`] handle is shared by every store. All access goes
//! through [`Database::with_conn`], which serializes callers behind a
//! mutex so each store call is one atomic unit of work against the
//! connection.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{debug, info};

use vigil_types::{Result, VigilError};

/// Shared handle to the embedded SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) `vigil.db` under `data_dir` and run migrations.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("vigil.db");
        let conn = Connection::open(&path).map_err(storage_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(storage_err)?;
        migrate(&conn)?;
        info!(path = %path.display(), "database opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection. Callers are serialized, so a single
    /// call is atomic with respect to every other store operation.
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn).map_err(storage_err)
    }
}

/// Convert a rusqlite error into the workspace error type.
pub(crate) fn storage_err(e: rusqlite::Error) -> VigilError {
    VigilError::Storage(e.to_string())
}

/// Create tables and apply additive column migrations.
fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS agent_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            directive TEXT NOT NULL,
            short_term_goals TEXT NOT NULL DEFAULT '[]',
            mid_term_goals TEXT NOT NULL DEFAULT '[]',
            long_term_goals TEXT NOT NULL DEFAULT '[]',
            active_task TEXT,
            loop_iteration INTEGER NOT NULL DEFAULT 0,
            is_paused INTEGER NOT NULL DEFAULT 0,
            started_at TEXT NOT NULL,
            last_heartbeat TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS budget_config (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            monthly_cap_usd REAL NOT NULL,
            current_month TEXT NOT NULL,
            current_month_total REAL NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS provider_balance (
            provider TEXT PRIMARY KEY,
            known_balance REAL,
            currency TEXT NOT NULL DEFAULT 'USD',
            tier TEXT NOT NULL DEFAULT 'unknown',
            spent_tracked REAL NOT NULL DEFAULT 0,
            balance_updated_at TEXT,
            notes TEXT NOT NULL DEFAULT ''
        );
        CREATE TABLE IF NOT EXISTS budget_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            input_tokens INTEGER NOT NULL,
            output_tokens INTEGER NOT NULL,
            cost_usd REAL NOT NULL,
            task_description TEXT
        );
        CREATE TABLE IF NOT EXISTS tool_usage_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            tool_name TEXT NOT NULL,
            parameters TEXT NOT NULL DEFAULT '{}',
            result_summary TEXT,
            success INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL DEFAULT 0,
            error TEXT
        );
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            role TEXT NOT NULL,
            source TEXT NOT NULL DEFAULT 'web',
            content TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS metrics (
            name TEXT PRIMARY KEY,
            value REAL NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )
    .map_err(storage_err)?;

    // Columns added after the initial schema shipped. ALTER ADD COLUMN only;
    // existing rows get the defaults.
    add_column_if_missing(conn, "agent_state", "current_goals", "TEXT NOT NULL DEFAULT '[]'")?;
    add_column_if_missing(
        conn,
        "agent_state",
        "short_term_memories",
        "TEXT NOT NULL DEFAULT '[]'",
    )?;

    Ok(())
}

/// `true` if `table` already has `column`.
fn has_column(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn add_column_if_missing(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<()> {
    if !has_column(conn, table, column).map_err(storage_err)? {
        debug!(table, column, "adding missing column");
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl}"), [])
            .map_err(storage_err)?;
    }
    Ok(())
}
