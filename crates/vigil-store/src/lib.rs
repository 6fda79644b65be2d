//! Durable persistence for the vigil agent runtime.
//!
//! Everything the agent must not forget across restarts lives here, under
//! a single data directory:
//!
//! - `vigil.db` -- SQLite tables for agent state, budget config and ledger,
//!   provider balances, chat messages, tool usage, and metrics
//! - `blob/YYYY-MM-DD.jsonl` -- the append-only event journal
//! - `logs/YYYY-MM-DD.jsonl` -- the daily operational log
//! - `.env` -- secrets managed through [`SecretsStore`](env::SecretsStore)
//!
//! Schema migration is additive only: tables are created if missing and
//! new columns are added with guarded `ALTER TABLE ADD COLUMN`, so an old
//! database always opens under a newer binary.

pub mod budget;
pub mod chatlog;
pub mod db;
pub mod env;
pub mod journal;
pub mod metrics;
pub mod state;
pub mod toollog;

pub use budget::BudgetStore;
pub use db::Database;
pub use env::SecretsStore;
pub use journal::{FileLog, Journal};
pub use state::StatePersistor;
