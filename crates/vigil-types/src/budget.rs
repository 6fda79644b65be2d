//! Budget ledger types.
//!
//! Provider balances are declared in mixed currencies: real money (USD,
//! EUR, GBP) or opaque units (credits, requests). Unit currencies count
//! one unit per successful call; monetary ones accumulate estimated USD.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The currency a provider balance is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    /// Non-monetary unit such as `credits` or `requests`.
    Unit(String),
}

impl Currency {
    /// `true` for currencies that contribute to the overall USD total.
    pub fn is_monetary(&self) -> bool {
        matches!(self, Currency::Usd | Currency::Eur | Currency::Gbp)
    }

    /// The canonical code used in storage and display.
    pub fn code(&self) -> &str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Unit(u) => u,
        }
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        match s.as_str() {
            "USD" | "usd" | "" => Currency::Usd,
            "EUR" | "eur" => Currency::Eur,
            "GBP" | "gbp" => Currency::Gbp,
            _ => Currency::Unit(s),
        }
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::Usd
    }
}

/// Whether a provider costs money, is free, or undetermined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    Paid,
    Free,
    Unknown,
}

impl Default for ProviderTier {
    fn default() -> Self {
        ProviderTier::Unknown
    }
}

/// Declared balance and tracked spend for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBalance {
    pub provider: String,
    /// Last balance the user (or the agent) told us about, in `currency`.
    pub known_balance: Option<f64>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub tier: ProviderTier,
    /// Accumulated spend since the balance was last set: USD for monetary
    /// currencies, call count for unit currencies.
    #[serde(default)]
    pub spent_tracked: f64,
    pub balance_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

impl ProviderBalance {
    /// `max(0, known_balance - spent_tracked)`, or `None` when no balance
    /// was ever declared.
    pub fn estimated_remaining(&self) -> Option<f64> {
        self.known_balance.map(|b| (b - self.spent_tracked).max(0.0))
    }
}

/// One appended usage ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
    pub task_description: Option<String>,
}

/// Which term decided the overall `remaining` figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetSource {
    /// The monthly cap from config dominated.
    Config,
    /// The sum of declared provider balances dominated.
    Providers,
}

/// Per-provider view inside a [`BudgetStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub known_balance: Option<f64>,
    pub spent_tracked: f64,
    pub estimated_remaining: Option<f64>,
    pub tier: ProviderTier,
    pub currency: Currency,
    pub notes: String,
    pub balance_updated_at: Option<DateTime<Utc>>,
}

/// Snapshot of the whole budget picture, handed to the planner and loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub monthly_cap: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percent_used: f64,
    pub source: BudgetSource,
    pub providers: Vec<ProviderStatus>,
}

impl BudgetStatus {
    /// `true` when at least one declared-free provider exists.
    pub fn has_free_providers(&self) -> bool {
        self.providers
            .iter()
            .any(|p| p.tier == ProviderTier::Free)
    }
}
