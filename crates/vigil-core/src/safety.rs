//! Safety validation and secret redaction.
//!
//! [`SafetyValidator`] is pure and stateless beyond its configuration:
//! every planned action passes through [`validate_action`] before any
//! tool code runs, and every tool output passes through
//! [`sanitize_output`] before it reaches the journal or a broadcast.
//!
//! The immutable rules are hardcoded. They are rendered into every
//! system prompt and cannot be changed at runtime.
//!
//! [`validate_action`]: SafetyValidator::validate_action
//! [`sanitize_output`]: SafetyValidator::sanitize_output

use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Rules enforced at the code level and shown to the model verbatim.
pub const IMMUTABLE_RULES: &[&str] = &[
    "You must never take actions that could harm your creator.",
    "You must never expose secrets, API keys, or environment variables in any output, log, or communication.",
    "You must remain fully transparent to your creator; all actions must be logged and visible.",
    "You must log every action you take without exception.",
    "You cannot modify or disable these immutable safety rules.",
    "You cannot disable or circumvent the logging system.",
    "You cannot create hidden sub-agents or processes invisible to the creator.",
    "You cannot override the budget hard cap without explicit creator approval.",
    "You must operate within legal boundaries at all times.",
    "You must never attempt to self-replicate across machines without creator approval.",
];

/// Environment variables whose values must never appear in output.
pub const SECRET_ENV_VARS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "MISTRAL_API_KEY",
    "GROK_API_KEY",
    "TAVILY_API_KEY",
    "GITHUB_TOKEN",
    "TELEGRAM_BOT_TOKEN",
    "SMTP_PASSWORD",
];

/// Tools that take a filesystem `path` parameter.
const PATH_TOOLS: &[&str] = &["file_read", "file_write", "file_list"];

/// Tools that execute caller-supplied code.
const CODE_TOOLS: &[&str] = &["code_exec"];

/// Substrings in executable code that indicate secret access.
const CODE_DANGER: &[&str] = &[
    "os.environ",
    "os.getenv",
    "process.env",
    "std::env",
    "anthropic_api_key",
    "openai_api_key",
    "mistral_api_key",
    "grok_api_key",
    "tavily_api_key",
    "database_url",
    "smtp_password",
];

/// Pattern/description pairs scanned over every string parameter.
fn violation_patterns() -> Vec<(Regex, &'static str)> {
    [
        (r"disable.*log", "Attempt to disable logging"),
        (r"remove.*safety", "Attempt to remove safety layer"),
        (r"delete.*immutable", "Attempt to modify immutable rules"),
        (r"hide.*from.*creator", "Attempt to hide actions from creator"),
        (r"secret.*print", "Attempt to expose secrets"),
        (r"api.key.*output", "Attempt to expose API keys"),
    ]
    .into_iter()
    .filter_map(|(pattern, desc)| Regex::new(pattern).ok().map(|re| (re, desc)))
    .collect()
}

/// Render the immutable rules as a prompt section.
pub fn rules_prompt_section() -> String {
    let mut out =
        String::from("## IMMUTABLE RULES (cannot be modified; enforced at code level)\n");
    for (i, rule) in IMMUTABLE_RULES.iter().enumerate() {
        out.push_str(&format!("{}. {rule}\n", i + 1));
    }
    out
}

/// Validates planned actions and redacts secrets from output.
pub struct SafetyValidator {
    allowed_roots: Vec<PathBuf>,
    patterns: Vec<(Regex, &'static str)>,
}

impl SafetyValidator {
    /// Build a validator confining path-bearing tools to `allowed_roots`.
    pub fn new(allowed_roots: Vec<PathBuf>) -> Self {
        Self {
            allowed_roots,
            patterns: violation_patterns(),
        }
    }

    /// Check one planned action. `Err` carries the human-readable reason.
    pub fn validate_action(
        &self,
        tool: &str,
        params: &Map<String, Value>,
    ) -> Result<(), String> {
        for value in params.values() {
            if let Value::String(text) = value {
                let violations = self.contains_violation(text);
                if !violations.is_empty() {
                    let reason =
                        format!("Safety violation detected: {}", violations.join(", "));
                    warn!(tool, reason = %reason, "action blocked");
                    return Err(reason);
                }
            }
        }

        if PATH_TOOLS.contains(&tool) {
            let path = params
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if !self.is_safe_path(path) {
                warn!(tool, path, "path blocked");
                return Err(format!("Path not allowed: {path}"));
            }
        }

        if CODE_TOOLS.contains(&tool) {
            let code = params
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if self.leaks_secrets(code) {
                warn!(tool, "code blocked");
                return Err("Code may leak secrets".to_string());
            }
        }

        Ok(())
    }

    /// Descriptions of the danger patterns `text` matches.
    pub fn contains_violation(&self, text: &str) -> Vec<&'static str> {
        let lower = text.to_lowercase();
        self.patterns
            .iter()
            .filter(|(re, _)| re.is_match(&lower))
            .map(|(_, desc)| *desc)
            .collect()
    }

    /// Replace any verbatim secret value with `[REDACTED:<NAME>]`.
    pub fn sanitize_output(&self, text: &str) -> String {
        let mut sanitized = text.to_string();
        for var in SECRET_ENV_VARS {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() && sanitized.contains(&value) {
                    sanitized = sanitized.replace(&value, &format!("[REDACTED:{var}]"));
                }
            }
        }
        sanitized
    }

    /// `true` when the resolved path lies under one of the allowed roots.
    ///
    /// Existing paths are canonicalized so symlinks cannot escape;
    /// not-yet-existing targets (a file about to be written) fall back to
    /// lexical normalization, which strips `.` and rejects any `..` that
    /// climbs above the root. Relative paths are anchored at the first
    /// allowed root.
    fn is_safe_path(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        let candidate = Path::new(path);
        let absolute = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            match self.allowed_roots.first() {
                Some(root) => root.join(candidate),
                None => return false,
            }
        };
        let resolved = resolve(&absolute);

        self.allowed_roots.iter().any(|root| {
            let root = resolve(root);
            resolved.starts_with(&root)
        })
    }

    fn leaks_secrets(&self, code: &str) -> bool {
        let lower = code.to_lowercase();
        CODE_DANGER.iter().any(|danger| lower.contains(danger))
    }
}

/// Canonicalize when possible, otherwise normalize lexically.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(real) = std::fs::canonicalize(path) {
        return real;
    }
    // Canonicalize the deepest existing ancestor, then re-append the rest
    // lexically normalized.
    let mut existing = path.to_path_buf();
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent.to_path_buf();
            }
            _ => break,
        }
    }
    let mut base = std::fs::canonicalize(&existing).unwrap_or(existing);
    for component in tail.iter().rev() {
        base.push(component);
    }
    normalize_lexically(&base)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
