//! Provider and router error types.

use thiserror::Error;

/// Errors from a single provider call or from the router walk.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The HTTP request failed before a response arrived.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The provider is throttling (HTTP 429).
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying, in milliseconds.
        retry_after_ms: u64,
    },

    /// The requested model does not exist on the provider.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The provider has no credentials configured.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The response could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The request timed out.
    #[error("timeout")]
    Timeout,

    /// Every candidate in every reachable tier failed.
    #[error("all providers failed: [{}]", attempts.join("; "))]
    AllProvidersExhausted {
        /// One `provider/model: error` line per failed candidate.
        attempts: Vec<String>,
    },

    /// HTTP-level error from the client.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error while building or reading a payload.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(
            ProviderError::RequestFailed("reset".into()).to_string(),
            "request failed: reset"
        );
        assert_eq!(
            ProviderError::AuthFailed("bad key".into()).to_string(),
            "authentication failed: bad key"
        );
        assert_eq!(
            ProviderError::RateLimited { retry_after_ms: 1500 }.to_string(),
            "rate limited: retry after 1500ms"
        );
        assert_eq!(ProviderError::Timeout.to_string(), "timeout");
    }

    #[test]
    fn exhausted_lists_attempts() {
        let err = ProviderError::AllProvidersExhausted {
            attempts: vec!["a/m1: timeout".into(), "b/m2: authentication failed: x".into()],
        };
        let text = err.to_string();
        assert!(text.starts_with("all providers failed"));
        assert!(text.contains("a/m1"));
        assert!(text.contains("b/m2"));
    }

    #[test]
    fn json_error_converts() {
        let serde_err = serde_json::from_str::<serde_json::Value>("nope").unwrap_err();
        let err: ProviderError = serde_err.into();
        assert!(err.to_string().starts_with("json error:"));
    }
}
