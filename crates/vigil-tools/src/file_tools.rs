//! Sandboxed file tools.
//!
//! All three tools confine themselves to the workspace directory:
//! relative paths are anchored there, absolute paths must already lie
//! under it, and lexical `..` traversal is rejected. The dispatcher's
//! safety validator enforces the same boundary independently.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use vigil_core::tools::Tool;
use vigil_types::tool::ToolResult;

/// Maximum bytes returned by `file_read`.
const MAX_READ_BYTES: u64 = 256 * 1024;

/// Resolve `path` inside `root`, or explain why it cannot be.
fn resolve_in_root(root: &Path, path: &str) -> Result<PathBuf, String> {
    if path.is_empty() {
        return Err("path must not be empty".into());
    }
    let candidate = Path::new(path);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(format!("path escapes workspace: {path}"));
                }
            }
            other => normalized.push(other),
        }
    }
    if !normalized.starts_with(root) {
        return Err(format!("path escapes workspace: {path}"));
    }
    Ok(normalized)
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

/// Read a file from the workspace.
pub struct FileReadTool {
    root: PathBuf,
}

impl FileReadTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }
    fn description(&self) -> &str {
        "Read a text file from the workspace"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path, relative to the workspace"}
            },
            "required": ["path"]
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let Some(path) = str_param(&params, "path") else {
            return ToolResult::fail("missing required parameter: path");
        };
        let resolved = match resolve_in_root(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e),
        };
        match std::fs::metadata(&resolved) {
            Ok(meta) if meta.len() > MAX_READ_BYTES => {
                return ToolResult::fail(format!(
                    "file too large ({} bytes, max {MAX_READ_BYTES})",
                    meta.len()
                ));
            }
            Ok(_) => {}
            Err(e) => return ToolResult::fail(format!("cannot read {path}: {e}")),
        }
        match std::fs::read_to_string(&resolved) {
            Ok(content) => ToolResult::ok(content),
            Err(e) => ToolResult::fail(format!("cannot read {path}: {e}")),
        }
    }
}

/// Write a file into the workspace, creating parent directories.
pub struct FileWriteTool {
    root: PathBuf,
}

impl FileWriteTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }
    fn description(&self) -> &str {
        "Write a text file inside the workspace"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path, relative to the workspace"},
                "content": {"type": "string", "description": "Full file content"}
            },
            "required": ["path", "content"]
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let Some(path) = str_param(&params, "path") else {
            return ToolResult::fail("missing required parameter: path");
        };
        let Some(content) = str_param(&params, "content") else {
            return ToolResult::fail("missing required parameter: content");
        };
        let resolved = match resolve_in_root(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e),
        };
        if let Some(parent) = resolved.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ToolResult::fail(format!("cannot create parent dirs: {e}"));
            }
        }
        match std::fs::write(&resolved, content) {
            Ok(()) => ToolResult::ok(format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolResult::fail(format!("cannot write {path}: {e}")),
        }
    }
}

/// List a workspace directory.
pub struct FileListTool {
    root: PathBuf,
}

impl FileListTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }
    fn description(&self) -> &str {
        "List files in a workspace directory"
    }
    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory, relative to the workspace; defaults to the root"}
            }
        })
    }
    async fn execute(&self, params: Map<String, Value>) -> ToolResult {
        let path = str_param(&params, "path").unwrap_or(".");
        let resolved = match resolve_in_root(&self.root, path) {
            Ok(p) => p,
            Err(e) => return ToolResult::fail(e),
        };
        let entries = match std::fs::read_dir(&resolved) {
            Ok(entries) => entries,
            Err(e) => return ToolResult::fail(format!("cannot list {path}: {e}")),
        };
        let mut lines: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| {
                let kind = if e.path().is_dir() { "dir " } else { "file" };
                format!("{kind} {}", e.file_name().to_string_lossy())
            })
            .collect();
        lines.sort();
        ToolResult::ok(lines.join("\n"))
    }
}
