//! The secrets store.
//!
//! Runtime credential management over the process environment and an
//! on-disk `.env` file. `set` takes effect immediately (the provider
//! adapters re-read keys per request) and persists atomically: the new
//! file is written next to the old one and swapped in with a rename.
//! Listings always mask values; the raw secret only leaves this module
//! through [`SecretsStore::get`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::info;

use vigil_types::secret::SecretValue;
use vigil_types::{Result, VigilError};

/// Key substrings that mark a variable as sensitive.
const SENSITIVE_MARKERS: &[&str] = &["KEY", "TOKEN", "SECRET", "PASSWORD", "PASS", "CREDENTIAL"];

/// `true` when the variable should be masked in listings.
pub fn is_sensitive(key: &str) -> bool {
    let upper = key.to_uppercase();
    SENSITIVE_MARKERS.iter().any(|m| upper.contains(m))
}

/// Environment-variable-backed secrets with `.env` persistence.
pub struct SecretsStore {
    env_path: PathBuf,
    write_lock: Mutex<()>,
}

impl SecretsStore {
    /// Use (or create) `data_dir/.env` as the persistence file.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        Ok(Self {
            env_path: data_dir.join(".env"),
            write_lock: Mutex::new(()),
        })
    }

    /// Read a secret from the process environment.
    pub fn get(&self, key: &str) -> Option<SecretValue> {
        std::env::var(key).ok().filter(|v| !v.is_empty()).map(SecretValue::new)
    }

    /// Set a secret in the live environment and persist it to `.env`.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        std::env::set_var(key, value);
        self.persist(key, Some(value))?;
        info!(key, "secret set");
        Ok(())
    }

    /// Remove a secret from the environment and `.env`. Returns whether
    /// the key existed in either place.
    pub fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let in_env = std::env::var(key).is_ok();
        std::env::remove_var(key);
        let in_file = self.persist(key, None)?;
        info!(key, "secret deleted");
        Ok(in_env || in_file)
    }

    /// Keys and masked values from the `.env` file, sorted by key.
    /// Sensitive values show only a tail; non-sensitive ones are shown
    /// in full.
    pub fn list_masked(&self) -> Result<Vec<(String, String)>> {
        let entries = self.read_env_file()?;
        Ok(entries
            .into_iter()
            .map(|(key, value)| {
                let display = if is_sensitive(&key) {
                    SecretValue::new(value).masked()
                } else {
                    value
                };
                (key, display)
            })
            .collect())
    }

    fn read_env_file(&self) -> Result<BTreeMap<String, String>> {
        let mut entries = BTreeMap::new();
        if !self.env_path.exists() {
            return Ok(entries);
        }
        let raw = std::fs::read_to_string(&self.env_path)?;
        for line in raw.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(entries)
    }

    /// Rewrite `.env` with `key` set to `value` (or removed when `None`),
    /// atomically via temp-file + rename. Returns whether the key was
    /// previously present in the file.
    fn persist(&self, key: &str, value: Option<&str>) -> Result<bool> {
        let _guard = self.write_lock.lock();
        let mut entries = self.read_env_file()?;
        let existed = entries.contains_key(key);
        match value {
            Some(v) => {
                entries.insert(key.to_string(), v.to_string());
            }
            None => {
                entries.remove(key);
            }
        }

        let mut content = String::new();
        for (k, v) in &entries {
            content.push_str(k);
            content.push('=');
            content.push_str(v);
            content.push('\n');
        }

        let tmp = self.env_path.with_extension("env.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.env_path)?;
        Ok(existed)
    }
}

fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(VigilError::ConfigInvalid {
            reason: format!("invalid env var name: {key:?}"),
        })
    }
}
