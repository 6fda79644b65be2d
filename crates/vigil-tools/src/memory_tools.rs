//! Long-term memory tools.
//!
//! `memory_write` stores a fact in the vector store; `memory_search`
//! retrieves the closest entries for a query. Both operate on the same
//! store the planner's retrieval uses, so anything written here shows up
//! in future prompts when relevant.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vigil_core::tools::Tool;
use vigil_memory::{MemoryEntry, VectorMemory};
use vigil_types::tool::ToolResult;

/// Store a fact in long-term memory.
pub struct MemoryWriteTool {
    vector: Arc<VectorMemory>,
}

impl MemoryWriteTool {
    pub fn new(vector: Arc<VectorMemory>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn name(&self) -> &str {
        "memory_write"
    }
    fn description(&self) -> &str {
        "Store a fact in long-term memory (deduplicated automatically)"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "The fact to remember"},
                "importance": {"type": "number", "description": "0.01-1.0, default 0.5"},
                "ttl_hours": {"type": "integer", "description": "Hours until expiry; -1 (default) = never"},
                "permanent": {"type": "boolean", "description": "Exempt from decay and expiry"}
            },
            "required": ["content"]
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let Some(content) = params.get("content").and_then(Value::as_str) else {
            return ToolResult::fail("missing required parameter: content");
        };
        let importance = params
            .get("importance")
            .and_then(Value::as_f64)
            .unwrap_or(0.5);
        let ttl_hours = params
            .get("ttl_hours")
            .and_then(Value::as_i64)
            .unwrap_or(-1);
        let permanent = params
            .get("permanent")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let mut entry = MemoryEntry::new(content, importance, "tool:memory_write").with_ttl(ttl_hours);
        if permanent {
            entry = entry.permanent();
        }
        match self.vector.add(entry, true).await {
            Ok(true) => ToolResult::ok("stored"),
            Ok(false) => ToolResult::ok("merged into an existing near-duplicate"),
            Err(e) => ToolResult::fail(format!("memory write failed: {e}")),
        }
    }
}

/// Search long-term memory.
pub struct MemorySearchTool {
    vector: Arc<VectorMemory>,
}

impl MemorySearchTool {
    pub fn new(vector: Arc<VectorMemory>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }
    fn description(&self) -> &str {
        "Search long-term memory by semantic similarity"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "What to look for"},
                "n": {"type": "integer", "description": "Max results, default 5"}
            },
            "required": ["query"]
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let Some(query) = params.get("query").and_then(Value::as_str) else {
            return ToolResult::fail("missing required parameter: query");
        };
        let n = params
            .get("n")
            .and_then(Value::as_u64)
            .map(|n| n.clamp(1, 50) as usize)
            .unwrap_or(5);

        match self.vector.search(query, n).await {
            Ok(hits) if hits.is_empty() => ToolResult::ok("no matching memories"),
            Ok(hits) => {
                let lines: Vec<String> = hits
                    .iter()
                    .map(|h| {
                        format!(
                            "- [{:.3}] {} (importance {:.2}, {})",
                            h.distance, h.content, h.importance_score, h.source
                        )
                    })
                    .collect();
                ToolResult::ok(lines.join("\n"))
            }
            Err(e) => ToolResult::fail(format!("memory search failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_memory::HashEmbedder;

    fn store() -> Arc<VectorMemory> {
        Arc::new(VectorMemory::in_memory(Arc::new(HashEmbedder::default())))
    }

    fn params(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn write_then_search() {
        let vector = store();
        let write = MemoryWriteTool::new(vector.clone());
        let search = MemorySearchTool::new(vector);

        let result = write
            .execute(params(&[("content", json!("the deploy key lives in vault"))]))
            .await;
        assert!(result.success);
        assert_eq!(result.output, "stored");

        let result = search
            .execute(params(&[("query", json!("deploy key vault"))]))
            .await;
        assert!(result.success);
        assert!(result.output.contains("deploy key"));
    }

    #[tokio::test]
    async fn duplicate_write_reports_merge() {
        let vector = store();
        let write = MemoryWriteTool::new(vector);
        let p = params(&[("content", json!("identical fact"))]);
        assert_eq!(write.execute(p.clone()).await.output, "stored");
        let second = write.execute(p).await;
        assert!(second.success);
        assert!(second.output.contains("merged"));
    }

    #[tokio::test]
    async fn permanent_flag_respected() {
        let vector = store();
        let write = MemoryWriteTool::new(vector.clone());
        write
            .execute(params(&[
                ("content", json!("keep forever")),
                ("permanent", json!(true)),
            ]))
            .await;
        let all = vector.get_all(10, 0);
        assert!(all[0].permanent);
        assert_eq!(all[0].ttl_hours, -1);
    }

    #[tokio::test]
    async fn search_empty_store() {
        let search = MemorySearchTool::new(store());
        let result = search.execute(params(&[("query", json!("anything"))])).await;
        assert!(result.success);
        assert_eq!(result.output, "no matching memories");
    }

    #[tokio::test]
    async fn missing_params_fail() {
        let vector = store();
        assert!(!MemoryWriteTool::new(vector.clone())
            .execute(Map::new())
            .await
            .success);
        assert!(!MemorySearchTool::new(vector).execute(Map::new()).await.success);
    }
}
