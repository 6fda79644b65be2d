//! The tool dispatcher.
//!
//! Every tool invocation in the system flows through
//! [`ToolDispatcher::execute`]: registry lookup, the safety gate, the
//! per-tool timeout, output sanitization, one journal record, and one
//! analytics row. A rejected action never reaches tool code, and no
//! secret survives into the journal.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use vigil_store::journal::Journal;
use vigil_store::toollog::ToolUsageLog;
use vigil_types::tool::ToolResult;

use crate::safety::SafetyValidator;
use crate::tools::ToolRegistry;

/// Journal/analytics caps for recorded output.
const OUTPUT_HEAD_CHARS: usize = 1000;
const SUMMARY_CHARS: usize = 500;
const PARAM_VALUE_CHARS: usize = 200;

/// The single chokepoint for tool execution.
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    validator: Arc<SafetyValidator>,
    journal: Arc<Journal>,
    tool_log: ToolUsageLog,
}

impl ToolDispatcher {
    pub fn new(
        registry: Arc<ToolRegistry>,
        validator: Arc<SafetyValidator>,
        journal: Arc<Journal>,
        tool_log: ToolUsageLog,
    ) -> Self {
        Self {
            registry,
            validator,
            journal,
            tool_log,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one tool invocation end to end.
    pub async fn execute(&self, tool_name: &str, params: Map<String, Value>) -> ToolResult {
        let start = Instant::now();

        let result = match self.registry.get(tool_name) {
            None => ToolResult::fail(format!("Unknown tool: {tool_name}")),
            Some(tool) => match self.validator.validate_action(tool_name, &params) {
                Err(reason) => {
                    warn!(tool = tool_name, reason = %reason, "tool blocked");
                    ToolResult::fail(format!("Blocked by safety: {reason}"))
                }
                Ok(()) => {
                    let timeout = Duration::from_secs(tool.timeout_seconds());
                    match tokio::time::timeout(timeout, tool.execute(params.clone())).await {
                        Ok(mut result) => {
                            result.output = self.validator.sanitize_output(&result.output);
                            if let Some(err) = result.error.take() {
                                result.error = Some(self.validator.sanitize_output(&err));
                            }
                            result
                        }
                        Err(_) => {
                            error!(
                                tool = tool_name,
                                timeout_secs = tool.timeout_seconds(),
                                "tool timed out"
                            );
                            ToolResult::fail(format!(
                                "Tool timed out after {}s",
                                tool.timeout_seconds()
                            ))
                        }
                    }
                }
            },
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        self.record(tool_name, &params, &result, duration_ms);
        info!(
            tool = tool_name,
            success = result.success,
            duration_ms,
            "tool executed"
        );
        result
    }

    /// One journal record and one analytics row per invocation. Failures
    /// to record are logged and swallowed: recording must never change
    /// the result the agent sees.
    fn record(
        &self,
        tool_name: &str,
        params: &Map<String, Value>,
        result: &ToolResult,
        duration_ms: u64,
    ) {
        let params_summary = summarize_params(params);
        let output_head: String = result.output.chars().take(OUTPUT_HEAD_CHARS).collect();

        let mut metadata = Map::new();
        metadata.insert("tool".into(), json!(tool_name));
        metadata.insert("success".into(), json!(result.success));
        metadata.insert("duration_ms".into(), json!(duration_ms));
        if let Some(err) = &result.error {
            metadata.insert("error".into(), json!(err));
        }
        let content = format!(
            "Tool: {tool_name}\nParams: {params_summary}\nSuccess: {}\nOutput: {output_head}",
            result.success
        );
        if let Err(e) = self.journal.store("tool_output", &content, metadata) {
            warn!(tool = tool_name, error = %e, "journal write failed");
        }

        let summary: String = result.output.chars().take(SUMMARY_CHARS).collect();
        if let Err(e) = self.tool_log.record(
            tool_name,
            &params_summary,
            if summary.is_empty() { None } else { Some(&summary) },
            result.success,
            duration_ms,
            result.error.as_deref(),
        ) {
            warn!(tool = tool_name, error = %e, "tool usage log write failed");
        }
    }
}

/// JSON object with every value rendered and truncated, for recording.
fn summarize_params(params: &Map<String, Value>) -> String {
    let summary: Map<String, Value> = params
        .iter()
        .map(|(k, v)| {
            let rendered = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (
                k.clone(),
                Value::String(rendered.chars().take(PARAM_VALUE_CHARS).collect()),
            )
        })
        .collect();
    Value::Object(summary).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{EchoTool, SlowTool};
    use serde_json::json;

    struct Fixture {
        _dir: tempfile::TempDir,
        dispatcher: ToolDispatcher,
        journal: Arc<Journal>,
        tool_log: ToolUsageLog,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(ToolRegistry::new());
        registry.register(EchoTool::named("echo"));
        registry.register(Arc::new(SlowTool));
        let validator = Arc::new(SafetyValidator::new(vec![dir.path().to_path_buf()]));
        let journal = Arc::new(Journal::open(dir.path()).unwrap());
        let db = vigil_store::Database::open(dir.path()).unwrap();
        let tool_log = ToolUsageLog::new(db);
        let dispatcher = ToolDispatcher::new(
            registry,
            validator,
            journal.clone(),
            tool_log.clone(),
        );
        Fixture {
            _dir: dir,
            dispatcher,
            journal,
            tool_log,
        }
    }

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn successful_execution_journals_once() {
        let f = fixture();
        let result = f
            .dispatcher
            .execute("echo", params(&[("text", json!("hello"))]))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "echo: hello");

        let records = f.journal.read_filtered(Some("tool_output"), 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metadata["tool"], "echo");
        assert_eq!(records[0].metadata["success"], true);

        let rows = f.tool_log.recent(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].success);
    }

    #[tokio::test]
    async fn unknown_tool_fails_cleanly() {
        let f = fixture();
        let result = f.dispatcher.execute("nonexistent", Map::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Unknown tool: nonexistent"));
    }

    #[tokio::test]
    async fn blocked_action_never_reaches_tool() {
        let f = fixture();
        let echo = EchoTool::named("file_write");
        f.dispatcher.registry().register(echo.clone());

        let result = f
            .dispatcher
            .execute(
                "file_write",
                params(&[("path", json!("/etc/passwd")), ("content", json!("x"))]),
            )
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().starts_with("Blocked by safety"));
        assert_eq!(echo.call_count(), 0, "tool code must not run");

        // The blocked invocation is still journaled and logged.
        let records = f.journal.read_filtered(Some("tool_output"), 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(f.tool_log.recent(10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn timeout_reports_duration() {
        let f = fixture();
        let result = f.dispatcher.execute("slow_tool", Map::new()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool timed out after 1s"));
    }

    #[tokio::test]
    async fn output_is_sanitized_before_journaling() {
        let f = fixture();
        std::env::set_var("GROK_API_KEY", "grk-leaky-value-42");
        let result = f
            .dispatcher
            .execute("echo", params(&[("text", json!("key is grk-leaky-value-42"))]))
            .await;
        assert!(!result.output.contains("grk-leaky-value-42"));
        assert!(result.output.contains("[REDACTED:GROK_API_KEY]"));

        let records = f.journal.read_filtered(Some("tool_output"), 10).unwrap();
        assert!(!records[0].content.contains("grk-leaky-value-42"));
        std::env::remove_var("GROK_API_KEY");
    }

    #[tokio::test]
    async fn params_truncated_in_records() {
        let f = fixture();
        let long = "v".repeat(5000);
        f.dispatcher
            .execute("echo", params(&[("text", json!(long))]))
            .await;
        let rows = f.tool_log.recent(1).unwrap();
        assert!(rows[0].parameters.len() < 1000);
    }

    #[test]
    fn summarize_params_renders_non_strings() {
        let p = params(&[("count", json!(3)), ("flag", json!(true))]);
        let summary = summarize_params(&p);
        assert!(summary.contains("\"count\":\"3\""));
        assert!(summary.contains("\"flag\":\"true\""));
    }
}
