//! The [`Tool`] trait and registry.
//!
//! Tool implementations live in `vigil-tools` (and in external crates);
//! this module only defines the contract the dispatcher consumes and the
//! registry that stores registered tools. The registry has interior
//! mutability so tools can be registered after the runtime is wired.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use vigil_types::tool::ToolResult;

/// A named capability the agent can invoke through the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name, as referenced in plans.
    fn name(&self) -> &str;

    /// One-line description shown in the system prompt.
    fn description(&self) -> &str;

    /// Wall-clock limit for one execution.
    fn timeout_seconds(&self) -> u64 {
        30
    }

    /// Whether this tool's results are worth writing to long-term
    /// memory. Heavy research/communication tools opt in; plumbing
    /// tools stay out.
    fn substantive(&self) -> bool {
        false
    }

    /// JSON Schema for the parameters object.
    fn schema(&self) -> Value;

    /// Run the tool. Failures are reported inside the [`ToolResult`],
    /// not as panics.
    async fn execute(&self, params: Map<String, Value>) -> ToolResult;
}

/// Registry of available tools, indexed by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any existing tool of the same name.
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        debug!(tool = %name, "tool registered");
        self.tools.write().insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// All tool names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `true` when the named tool declares itself substantive.
    pub fn is_substantive(&self, name: &str) -> bool {
        self.tools
            .read()
            .get(name)
            .is_some_and(|t| t.substantive())
    }

    /// `{name, description, parameters}` for every tool, sorted by name.
    pub fn schemas(&self) -> Vec<Value> {
        let tools = self.tools.read();
        let mut entries: Vec<(String, Value)> = tools
            .values()
            .map(|t| {
                (
                    t.name().to_string(),
                    serde_json::json!({
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema(),
                    }),
                )
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, v)| v).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }
}
