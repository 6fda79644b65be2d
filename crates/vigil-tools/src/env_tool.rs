//! Credential management tool.
//!
//! The agent's surface onto the secrets store: list (masked), get
//! (masked for sensitive keys), set, and delete. Setting a key persists
//! it to `.env` and takes effect immediately because provider adapters
//! re-read the environment per request. Raw sensitive values are never
//! returned through this tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::info;

use vigil_core::tools::Tool;
use vigil_store::env::is_sensitive;
use vigil_store::SecretsStore;
use vigil_types::tool::ToolResult;

/// Manage environment credentials through the secrets store.
pub struct EnvManagerTool {
    secrets: Arc<SecretsStore>,
}

impl EnvManagerTool {
    pub fn new(secrets: Arc<SecretsStore>) -> Self {
        Self { secrets }
    }

    fn list(&self) -> ToolResult {
        match self.secrets.list_masked() {
            Ok(entries) if entries.is_empty() => ToolResult::ok("no variables stored"),
            Ok(entries) => {
                let lines: Vec<String> = entries
                    .iter()
                    .map(|(key, value)| format!("{key} = {value}"))
                    .collect();
                ToolResult::ok(lines.join("\n"))
            }
            Err(e) => ToolResult::fail(format!("list failed: {e}")),
        }
    }

    fn get(&self, key: &str) -> ToolResult {
        match self.secrets.get(key) {
            Some(value) if is_sensitive(key) => ToolResult::ok(format!("{key} = {}", value.masked())),
            Some(value) => ToolResult::ok(format!("{key} = {}", value.expose())),
            None => ToolResult::fail(format!("{key} is not set")),
        }
    }

    fn set(&self, key: &str, value: &str) -> ToolResult {
        match self.secrets.set(key, value) {
            Ok(()) => {
                info!(key, "credential installed");
                ToolResult::ok(format!("{key} set and persisted"))
            }
            Err(e) => ToolResult::fail(format!("set failed: {e}")),
        }
    }

    fn delete(&self, key: &str) -> ToolResult {
        match self.secrets.delete(key) {
            Ok(true) => ToolResult::ok(format!("{key} deleted")),
            Ok(false) => ToolResult::fail(format!("{key} was not set")),
            Err(e) => ToolResult::fail(format!("delete failed: {e}")),
        }
    }
}

#[async_trait]
impl Tool for EnvManagerTool {
    fn name(&self) -> &str {
        "env_manager"
    }
    fn description(&self) -> &str {
        "List, get, set, or delete environment credentials (values masked)"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["list", "get", "set", "delete"]},
                "key": {"type": "string"},
                "value": {"type": "string", "description": "Required for set"}
            },
            "required": ["action"]
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let action = params
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let key = params.get("key").and_then(Value::as_str);

        match (action, key) {
            ("list", _) => self.list(),
            ("get", Some(key)) => self.get(key),
            ("set", Some(key)) => match params.get("value").and_then(Value::as_str) {
                Some(value) => self.set(key, value),
                None => ToolResult::fail("set requires a value"),
            },
            ("delete", Some(key)) => self.delete(key),
            ("get" | "set" | "delete", None) => {
                ToolResult::fail(format!("{action} requires a key"))
            }
            (other, _) => ToolResult::fail(format!("unknown action: {other:?}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool() -> (tempfile::TempDir, EnvManagerTool) {
        let dir = tempfile::tempdir().unwrap();
        let secrets = Arc::new(SecretsStore::open(dir.path()).unwrap());
        (dir, EnvManagerTool::new(secrets))
    }

    fn params(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn key(suffix: &str) -> String {
        format!("VIGIL_ENVTOOL_{}_{suffix}", std::process::id())
    }

    #[tokio::test]
    async fn set_get_delete_cycle() {
        let (_dir, tool) = tool();
        let k = key("PLAIN_SETTING");

        let result = tool
            .execute(params(&[("action", "set"), ("key", &k), ("value", "hello")]))
            .await;
        assert!(result.success);

        let result = tool.execute(params(&[("action", "get"), ("key", &k)])).await;
        assert!(result.success);
        assert!(result.output.contains("hello"));

        let result = tool
            .execute(params(&[("action", "delete"), ("key", &k)]))
            .await;
        assert!(result.success);

        let result = tool.execute(params(&[("action", "get"), ("key", &k)])).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn sensitive_get_is_masked() {
        let (_dir, tool) = tool();
        let k = key("SERVICE_API_KEY");
        tool.execute(params(&[
            ("action", "set"),
            ("key", &k),
            ("value", "sk-very-secret-value-123"),
        ]))
        .await;

        let result = tool.execute(params(&[("action", "get"), ("key", &k)])).await;
        assert!(result.success);
        assert!(!result.output.contains("sk-very-secret-value-123"));
        assert!(result.output.contains("********"));
        std::env::remove_var(&k);
    }

    #[tokio::test]
    async fn list_masks_sensitive_entries() {
        let (_dir, tool) = tool();
        let k = key("OTHER_TOKEN");
        tool.execute(params(&[
            ("action", "set"),
            ("key", &k),
            ("value", "tok-abcdefghijklmnop"),
        ]))
        .await;

        let result = tool.execute(params(&[("action", "list")])).await;
        assert!(result.success);
        assert!(result.output.contains(&k));
        assert!(!result.output.contains("tok-abcdefghijklmnop"));
        std::env::remove_var(&k);
    }

    #[tokio::test]
    async fn invalid_invocations_fail() {
        let (_dir, tool) = tool();
        assert!(!tool.execute(params(&[("action", "get")])).await.success);
        assert!(
            !tool
                .execute(params(&[("action", "set"), ("key", "X")]))
                .await
                .success
        );
        assert!(!tool.execute(params(&[("action", "explode")])).await.success);
    }
}
