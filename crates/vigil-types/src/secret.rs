//! Secret value wrapper.
//!
//! [`SecretValue`] holds API keys and passwords in a form that cannot leak
//! through `Debug`, `Display`, or serialization. The only way to read the
//! raw value is an explicit [`expose`](SecretValue::expose) call at the
//! point of use (HTTP auth headers, `.env` writes).

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A sensitive string that is redacted everywhere except `expose()`.
///
/// - `Debug` and `Display` print a masked form
/// - `Serialize` always emits the empty string
/// - `Deserialize` accepts a plain string
#[derive(Clone, Default)]
pub struct SecretValue(String);

impl SecretValue {
    /// Wrap a raw secret.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Read the raw value. Call only where the secret is actually consumed.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `true` when no value is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A display-safe masked form: the last four characters with a
    /// fixed-width prefix, or `(empty)` when unset.
    ///
    /// The mask never reveals the secret's real length.
    pub fn masked(&self) -> String {
        if self.0.is_empty() {
            return "(empty)".into();
        }
        if self.0.chars().count() <= 8 {
            return "********".into();
        }
        let tail: String = self
            .0
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("********{tail}")
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretValue({})", self.masked())
    }
}

impl fmt::Display for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.masked())
    }
}

impl Serialize for SecretValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Secrets never round-trip through serialized state.
        serializer.serialize_str("")
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SecretValue(String::deserialize(deserializer)?))
    }
}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        SecretValue(s.to_string())
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
