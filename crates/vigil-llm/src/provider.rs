//! The [`Provider`] trait all LLM backends implement.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChatMessage, LlmResponse};

/// A backend that can complete a chat conversation.
///
/// Implementations own the protocol details for one API surface. The
/// router treats providers uniformly: it checks [`is_available`]
/// (credentials present, endpoint plausible) before attempting a call
/// and interprets any error as "try the next candidate".
///
/// [`is_available`]: Provider::is_available
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registered provider name (e.g. `"openai"`, `"ollama"`).
    fn name(&self) -> &str;

    /// `true` when the provider can plausibly serve a request right now.
    /// Checked per attempt, so credentials installed at runtime take
    /// effect without a restart.
    fn is_available(&self) -> bool;

    /// Execute one completion.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<LlmResponse>;
}
