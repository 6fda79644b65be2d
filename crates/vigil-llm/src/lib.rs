//! LLM provider abstraction and routing for the vigil agent runtime.
//!
//! One [`Provider`](provider::Provider) trait covers every backend; the
//! [`OpenAiCompatProvider`](openai_compat::OpenAiCompatProvider) speaks
//! the OpenAI chat-completions dialect that all the configured remote
//! providers (and the keyless local endpoint) accept. The
//! [`LlmRouter`](router::LlmRouter) walks a tier chain from the requested
//! quality band downward, consults the budget before every paid call,
//! prefers free candidates when money is tight, and records usage for
//! every response it returns.

pub mod error;
pub mod openai_compat;
pub mod provider;
pub mod router;
pub mod tiers;
pub mod types;

pub use error::{ProviderError, Result};
pub use openai_compat::{builtin_providers, OpenAiCompatProvider, ProviderConfig};
pub use provider::Provider;
pub use router::{BudgetControl, CompletionOptions, LlmRouter};
pub use tiers::{TierCandidate, TierChain};
pub use types::{ChatMessage, LlmResponse};
