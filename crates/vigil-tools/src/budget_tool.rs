//! Budget introspection tool.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vigil_core::tools::Tool;
use vigil_store::BudgetStore;
use vigil_types::tool::ToolResult;

/// Lets the agent inspect its own spending.
pub struct BudgetQueryTool {
    budget: Arc<BudgetStore>,
}

impl BudgetQueryTool {
    pub fn new(budget: Arc<BudgetStore>) -> Self {
        Self { budget }
    }
}

#[async_trait]
impl Tool for BudgetQueryTool {
    fn name(&self) -> &str {
        "budget_query"
    }
    fn description(&self) -> &str {
        "Check remaining budget, per-provider balances, and recent usage"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "include_usage": {"type": "boolean", "description": "Include recent usage rows"}
            }
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let status = match self.budget.get_status() {
            Ok(status) => status,
            Err(e) => return ToolResult::fail(format!("budget query failed: {e}")),
        };

        let mut report = match serde_json::to_value(&status) {
            Ok(value) => value,
            Err(e) => return ToolResult::fail(format!("budget query failed: {e}")),
        };

        if params
            .get("include_usage")
            .and_then(Value::as_bool)
            .unwrap_or(false)
        {
            match self.budget.recent_usage(20) {
                Ok(rows) => {
                    report["recent_usage"] = serde_json::to_value(rows).unwrap_or(Value::Null);
                }
                Err(e) => return ToolResult::fail(format!("budget query failed: {e}")),
            }
        }

        ToolResult::ok(report.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_store::Database;

    fn tool() -> BudgetQueryTool {
        let store = Arc::new(BudgetStore::new(Database::open_in_memory().unwrap(), 50.0));
        store.ensure_config().unwrap();
        store
            .record_usage("openai", "gpt-4o", 100_000, 100_000, Some("test"))
            .unwrap();
        BudgetQueryTool::new(store)
    }

    #[tokio::test]
    async fn reports_status_json() {
        let result = tool().execute(Map::new()).await;
        assert!(result.success);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert!(parsed["remaining"].is_number());
        assert!(parsed["providers"].is_array());
        assert!(parsed.get("recent_usage").is_none());
    }

    #[tokio::test]
    async fn includes_usage_when_asked() {
        let mut params = Map::new();
        params.insert("include_usage".into(), json!(true));
        let result = tool().execute(params).await;
        assert!(result.success);
        let parsed: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(parsed["recent_usage"].as_array().unwrap().len(), 1);
    }
}
