//! Error types for the vigil runtime.
//!
//! [`VigilError`] is the top-level error used across crates. Layer-specific
//! errors (provider failures, tool failures) live in their own crates and
//! convert into this type at the runtime boundary.

use thiserror::Error;

/// Top-level error type for the vigil runtime.
///
/// Variants distinguish recoverable conditions (provider hiccups, timeouts)
/// from fatal ones (bad config, storage corruption) so the iteration loop
/// can decide whether to drop an iteration or surface the failure.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VigilError {
    /// Durable storage failed (SQLite, journal file, snapshot).
    #[error("storage error: {0}")]
    Storage(String),

    /// An LLM provider or the router failed.
    #[error("provider error: {0}")]
    Provider(String),

    /// An operation exceeded its deadline.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Human-readable name of the operation that timed out.
        operation: String,
    },

    /// A safety boundary was violated (blocked path, secret leak attempt).
    #[error("security violation: {reason}")]
    SecurityViolation {
        /// What policy was violated.
        reason: String,
    },

    /// Configuration is malformed or semantically invalid.
    #[error("invalid config: {reason}")]
    ConfigInvalid {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A notification channel (telegram, broadcast) failed.
    #[error("channel error: {0}")]
    Channel(String),

    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VigilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_display() {
        let err = VigilError::Storage("disk full".into());
        assert_eq!(err.to_string(), "storage error: disk full");
    }

    #[test]
    fn timeout_display() {
        let err = VigilError::Timeout {
            operation: "tool:web_search".into(),
        };
        assert_eq!(err.to_string(), "operation timed out: tool:web_search");
    }

    #[test]
    fn security_violation_display() {
        let err = VigilError::SecurityViolation {
            reason: "path not allowed".into(),
        };
        assert_eq!(err.to_string(), "security violation: path not allowed");
    }

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: VigilError = io.into();
        assert!(matches!(err, VigilError::Io(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err: VigilError = json_err.into();
        assert!(matches!(err, VigilError::Json(_)));
    }

    #[test]
    fn result_alias() {
        fn ok() -> Result<u32> {
            Ok(7)
        }
        assert_eq!(ok().unwrap(), 7);
    }
}
