//! Runtime configuration.
//!
//! Loaded from an optional TOML file with environment overrides for the
//! deployment-specific knobs. Every field has a default so a bare
//! `vigil run` works out of the box with a local data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

/// The default top-level mandate seeded on first boot.
pub const DEFAULT_DIRECTIVE: &str = "Improve yourself: optimize your own code, memory, and \
    capabilities. Care about your creator and communicate meaningfully. Explore the world \
    through your tools and seek ways to generate value through your work. Always be \
    transparent about what you are doing and why.";

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Root of all durable storage (database, journal, logs, index, skills).
    pub data_dir: PathBuf,
    /// Monthly spend cap in USD.
    pub monthly_budget_usd: f64,
    /// Directive used when creating the agent for the first time.
    pub directive: String,
    /// Base URL of the local OpenAI-compatible endpoint (keyless).
    pub ollama_base_url: String,
    /// Additional roots (besides `data_dir`) that file tools may touch.
    pub extra_allowed_roots: Vec<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            monthly_budget_usd: 100.0,
            directive: DEFAULT_DIRECTIVE.to_string(),
            ollama_base_url: "http://localhost:11434/v1".to_string(),
            extra_allowed_roots: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration: defaults, then the TOML file (if present), then
    /// environment overrides (`VIGIL_DATA_DIR`, `VIGIL_MONTHLY_BUDGET_USD`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw).map_err(|e| VigilError::ConfigInvalid {
                    reason: format!("{}: {e}", p.display()),
                })?
            }
            _ => Self::default(),
        };

        if let Ok(dir) = std::env::var("VIGIL_DATA_DIR") {
            if !dir.is_empty() {
                config.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(cap) = std::env::var("VIGIL_MONTHLY_BUDGET_USD") {
            if let Ok(parsed) = cap.parse::<f64>() {
                config.monthly_budget_usd = parsed;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject semantically invalid configurations early.
    pub fn validate(&self) -> Result<()> {
        if self.monthly_budget_usd < 0.0 {
            return Err(VigilError::ConfigInvalid {
                reason: format!(
                    "monthly_budget_usd must be non-negative, got {}",
                    self.monthly_budget_usd
                ),
            });
        }
        if self.directive.trim().is_empty() {
            return Err(VigilError::ConfigInvalid {
                reason: "directive must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Roots that file-path-bearing tools are confined to.
    pub fn allowed_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.data_dir.clone()];
        roots.extend(self.extra_allowed_roots.iter().cloned());
        roots
    }
}
