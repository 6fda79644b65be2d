//! Tool invocation results.

use serde::{Deserialize, Serialize};

/// The outcome of one tool invocation, as seen by the loop and journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result carrying `output`.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// A failed result carrying `error` and no output.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_constructor() {
        let r = ToolResult::ok("done");
        assert!(r.success);
        assert_eq!(r.output, "done");
        assert!(r.error.is_none());
    }

    #[test]
    fn fail_constructor() {
        let r = ToolResult::fail("boom");
        assert!(!r.success);
        assert!(r.output.is_empty());
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn serde_skips_absent_error() {
        let json = serde_json::to_string(&ToolResult::ok("x")).unwrap();
        assert!(!json.contains("error"));
    }
}
