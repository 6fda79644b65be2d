//! Shared data model for the vigil agent runtime.
//!
//! This crate defines the types that flow between the runtime's
//! subsystems: the durable [`AgentState`](state::AgentState), the planner's
//! [`Plan`](plan::Plan) contract, budget ledger rows, model
//! [`Tier`](tier::Tier)s, chat envelopes, and the top-level
//! [`VigilError`](error::VigilError). It has no async or I/O dependencies
//! beyond config-file loading, so every other crate can depend on it.

pub mod budget;
pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod plan;
pub mod secret;
pub mod state;
pub mod tier;
pub mod tool;

pub use error::{Result, VigilError};
