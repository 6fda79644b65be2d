//! Built-in tool implementations for the vigil agent runtime.
//!
//! These are the always-available capabilities: sandboxed file access,
//! long-term memory reads/writes, budget introspection, and credential
//! management. Heavyweight tools (web search, shell, coding subagents)
//! are external and register themselves through the same [`Tool`] trait.
//!
//! [`Tool`]: vigil_core::tools::Tool

pub mod budget_tool;
pub mod env_tool;
pub mod file_tools;
pub mod memory_tools;

use std::path::PathBuf;
use std::sync::Arc;

use vigil_core::tools::ToolRegistry;
use vigil_memory::VectorMemory;
use vigil_store::{BudgetStore, SecretsStore};

/// Register every built-in tool.
///
/// File tools are confined to `workspace_dir` (normally the data
/// directory); the safety validator enforces the same boundary a second
/// time at dispatch.
pub fn register_builtin(
    registry: &ToolRegistry,
    workspace_dir: PathBuf,
    vector: Arc<VectorMemory>,
    budget: Arc<BudgetStore>,
    secrets: Arc<SecretsStore>,
) {
    registry.register(Arc::new(file_tools::FileReadTool::new(workspace_dir.clone())));
    registry.register(Arc::new(file_tools::FileWriteTool::new(workspace_dir.clone())));
    registry.register(Arc::new(file_tools::FileListTool::new(workspace_dir)));
    registry.register(Arc::new(memory_tools::MemoryWriteTool::new(vector.clone())));
    registry.register(Arc::new(memory_tools::MemorySearchTool::new(vector)));
    registry.register(Arc::new(budget_tool::BudgetQueryTool::new(budget)));
    registry.register(Arc::new(env_tool::EnvManagerTool::new(secrets)));
}
