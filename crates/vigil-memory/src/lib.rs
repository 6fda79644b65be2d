//! Memory subsystem for the vigil agent runtime.
//!
//! Three layers with different lifetimes:
//!
//! - [`vector::VectorMemory`] -- durable semantic store with importance
//!   decay, TTL expiry, and near-duplicate suppression
//! - [`working::WorkingMemory`] -- the in-process rolling message window
//!   fed to each LLM call
//! - the short-term scratch pad lives on `AgentState` (see `vigil-store`),
//!   not here
//!
//! Embeddings come from an [`embed::Embedder`] implementation; the
//! built-in [`embed::HashEmbedder`] is a deterministic fallback that
//! needs no model, and real embedding backends plug in through the trait.

pub mod embed;
pub mod vector;
pub mod working;

pub use embed::{Embedder, HashEmbedder};
pub use vector::{MemoryEntry, MemoryHit, VectorMemory};
pub use working::{ContextMessage, MemoryConfig, WorkingMemory};
