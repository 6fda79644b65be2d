//! The budget ledger.
//!
//! [`BudgetStore`] is the authoritative record of what the agent has
//! spent, what each provider has left, and which model tier the runtime
//! can currently afford. Costs are estimated from a static pricing table;
//! unknown models fall back to the provider's zero-rate default so drift
//! in the table degrades to under-counting rather than failure.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::{info, warn};

use vigil_types::budget::{
    BudgetSource, BudgetStatus, Currency, ProviderStatus, ProviderTier, UsageRecord,
};
use vigil_types::tier::Tier;
use vigil_types::Result;

use crate::db::Database;

/// Cost per 1M tokens: (provider, model, input, output).
const PRICING: &[(&str, &str, f64, f64)] = &[
    ("anthropic", "claude-opus-4-6", 5.0, 25.0),
    ("anthropic", "claude-sonnet-4-20250514", 3.0, 15.0),
    ("anthropic", "claude-haiku-35-20241022", 0.80, 4.0),
    ("openai", "gpt-5.2", 1.75, 14.0),
    ("openai", "gpt-4o", 2.50, 10.0),
    ("openai", "gpt-4o-mini", 0.15, 0.60),
    ("mistral", "mistral-large-latest", 2.0, 6.0),
    ("mistral", "mistral-small-latest", 0.20, 0.60),
    ("grok", "grok-4", 3.0, 15.0),
    ("grok", "grok-3-mini", 0.30, 0.50),
];

/// The provider set seeded on first run: (provider, known_balance, tier,
/// currency, notes).
const DEFAULT_PROVIDERS: &[(&str, Option<f64>, &str, &str, &str)] = &[
    ("anthropic", None, "paid", "USD", "Prepaid credits"),
    ("openai", None, "paid", "USD", "Prepaid credits"),
    ("mistral", None, "free", "USD", "Free tier, limits unknown"),
    ("grok", None, "paid", "USD", "Prepaid credits"),
    ("ollama", None, "free", "USD", "Local, no cost"),
    ("tavily", Some(1000.0), "free", "credits", "Monthly plan, 1000 credits/month"),
];

fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

/// Estimate the USD cost of one call from the pricing table.
fn estimate_cost(provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let (input_rate, output_rate) = PRICING
        .iter()
        .find(|(p, m, _, _)| *p == provider && *m == model)
        .map(|(_, _, i, o)| (*i, *o))
        .unwrap_or((0.0, 0.0));
    (input_tokens as f64 / 1_000_000.0) * input_rate
        + (output_tokens as f64 / 1_000_000.0) * output_rate
}

/// Authoritative ledger of provider balances, monthly spend, and tier
/// recommendation.
#[derive(Clone)]
pub struct BudgetStore {
    db: Database,
    monthly_cap_usd: f64,
}

impl BudgetStore {
    pub fn new(db: Database, monthly_cap_usd: f64) -> Self {
        Self { db, monthly_cap_usd }
    }

    /// Idempotently create the budget config row and seed the default
    /// provider set. Existing user-set balances are never overwritten;
    /// only missing providers are reconciled in.
    pub fn ensure_config(&self) -> Result<()> {
        let cap = self.monthly_cap_usd;
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO budget_config (id, monthly_cap_usd, current_month, current_month_total)
                 VALUES (1, ?1, ?2, 0)
                 ON CONFLICT (id) DO NOTHING",
                params![cap, current_month()],
            )?;

            let now = Utc::now().to_rfc3339();
            for (provider, balance, tier, currency, notes) in DEFAULT_PROVIDERS {
                let exists: Option<String> = c
                    .query_row(
                        "SELECT provider FROM provider_balance WHERE provider = ?1",
                        params![provider],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_none() {
                    c.execute(
                        "INSERT INTO provider_balance
                           (provider, known_balance, currency, tier, spent_tracked,
                            balance_updated_at, notes)
                         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6)",
                        params![
                            provider,
                            balance,
                            currency,
                            tier,
                            balance.map(|_| now.clone()),
                            notes,
                        ],
                    )?;
                }
            }
            Ok(())
        })
    }

    /// Record one LLM call: append a usage row, roll the month over if it
    /// changed, bump the monthly total, and track per-provider spend
    /// (USD for monetary currencies, one unit per call otherwise).
    /// Everything happens in a single transaction. Returns the estimated
    /// cost in USD.
    pub fn record_usage(
        &self,
        provider: &str,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        task_description: Option<&str>,
    ) -> Result<f64> {
        let cost = estimate_cost(provider, model, input_tokens, output_tokens);
        let month = current_month();
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|c| {
            let tx = c.unchecked_transaction()?;

            tx.execute(
                "INSERT INTO budget_usage
                   (timestamp, provider, model, input_tokens, output_tokens, cost_usd,
                    task_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    now,
                    provider,
                    model,
                    input_tokens as i64,
                    output_tokens as i64,
                    cost,
                    task_description,
                ],
            )?;

            roll_month_if_needed(&tx, &month)?;
            tx.execute(
                "UPDATE budget_config SET current_month_total = current_month_total + ?1
                 WHERE id = 1",
                params![cost],
            )?;

            let currency: Option<String> = tx
                .query_row(
                    "SELECT currency FROM provider_balance WHERE provider = ?1",
                    params![provider],
                    |row| row.get(0),
                )
                .optional()?;
            match currency {
                Some(code) => {
                    let increment = if Currency::from(code).is_monetary() {
                        cost
                    } else {
                        1.0
                    };
                    tx.execute(
                        "UPDATE provider_balance SET spent_tracked = spent_tracked + ?1
                         WHERE provider = ?2",
                        params![increment, provider],
                    )?;
                }
                None => {
                    // First sighting of this provider: track it from here on.
                    tx.execute(
                        "INSERT INTO provider_balance
                           (provider, known_balance, currency, tier, spent_tracked, notes)
                         VALUES (?1, NULL, 'USD', 'unknown', ?2, 'Auto-created from usage')",
                        params![provider, cost],
                    )?;
                }
            }

            tx.commit()
        })?;

        info!(provider, model, cost = format!("{cost:.6}"), "usage recorded");
        Ok(cost)
    }

    /// Overall budget picture plus the per-provider breakdown.
    ///
    /// `remaining` is the larger of the cap-derived figure and the sum of
    /// declared monetary balances; `source` names which term won, so a
    /// user-raised cap always takes effect upward.
    pub fn get_status(&self) -> Result<BudgetStatus> {
        let month = current_month();
        let fallback_cap = self.monthly_cap_usd;

        self.db.with_conn(|c| {
            let config: Option<(f64, String, f64)> = c
                .query_row(
                    "SELECT monthly_cap_usd, current_month, current_month_total
                     FROM budget_config WHERE id = 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            let (cap, spent) = match config {
                Some((cap, config_month, total)) => {
                    // A stale month reads as zero spend; the stored row is
                    // reset on the next usage record.
                    let spent = if config_month == month { total } else { 0.0 };
                    (cap, spent)
                }
                None => (fallback_cap, 0.0),
            };

            let mut stmt = c.prepare(
                "SELECT provider, known_balance, currency, tier, spent_tracked,
                        balance_updated_at, notes
                 FROM provider_balance ORDER BY provider",
            )?;
            let rows = stmt.query_map([], |row| {
                let currency = Currency::from(row.get::<_, String>(2)?);
                let tier = match row.get::<_, String>(3)?.as_str() {
                    "paid" => ProviderTier::Paid,
                    "free" => ProviderTier::Free,
                    _ => ProviderTier::Unknown,
                };
                let known_balance: Option<f64> = row.get(1)?;
                let spent_tracked: f64 = row.get(4)?;
                Ok(ProviderStatus {
                    provider: row.get(0)?,
                    known_balance,
                    spent_tracked,
                    estimated_remaining: known_balance.map(|b| (b - spent_tracked).max(0.0)),
                    tier,
                    currency,
                    notes: row.get(6)?,
                    balance_updated_at: row
                        .get::<_, Option<String>>(5)?
                        .and_then(|t| chrono::DateTime::parse_from_rfc3339(&t).ok())
                        .map(|t| t.with_timezone(&Utc)),
                })
            })?;
            let providers: Vec<ProviderStatus> = rows.collect::<rusqlite::Result<_>>()?;

            let provider_sum: f64 = providers
                .iter()
                .filter(|p| p.currency.is_monetary())
                .filter_map(|p| p.estimated_remaining)
                .sum();
            let cap_remaining = (cap - spent).max(0.0);

            let (remaining, source, effective_cap) = if provider_sum > cap_remaining {
                (provider_sum, BudgetSource::Providers, provider_sum + spent)
            } else {
                (cap_remaining, BudgetSource::Config, cap)
            };
            let percent_used = if effective_cap > 0.0 {
                (spent / effective_cap * 100.0 * 10.0).round() / 10.0
            } else {
                0.0
            };

            Ok(BudgetStatus {
                monthly_cap: (effective_cap * 100.0).round() / 100.0,
                spent: (spent * 10_000.0).round() / 10_000.0,
                remaining: (remaining * 10_000.0).round() / 10_000.0,
                percent_used,
                source,
                providers,
            })
        })
    }

    /// Balance info for one provider, if tracked.
    pub fn get_provider_status(&self, provider: &str) -> Result<Option<ProviderStatus>> {
        Ok(self
            .get_status()?
            .providers
            .into_iter()
            .find(|p| p.provider == provider))
    }

    /// Upsert a provider's declared balance and attributes. Passing
    /// `reset_spending` zeroes the tracked spend alongside a new balance.
    #[allow(clippy::too_many_arguments)]
    pub fn update_provider_balance(
        &self,
        provider: &str,
        known_balance: Option<f64>,
        tier: Option<ProviderTier>,
        currency: Option<Currency>,
        notes: Option<&str>,
        reset_spending: bool,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|c| {
            c.execute(
                "INSERT INTO provider_balance (provider, spent_tracked) VALUES (?1, 0)
                 ON CONFLICT (provider) DO NOTHING",
                params![provider],
            )?;
            if let Some(balance) = known_balance {
                c.execute(
                    "UPDATE provider_balance
                     SET known_balance = ?1, balance_updated_at = ?2 WHERE provider = ?3",
                    params![balance, now, provider],
                )?;
                if reset_spending {
                    c.execute(
                        "UPDATE provider_balance SET spent_tracked = 0 WHERE provider = ?1",
                        params![provider],
                    )?;
                }
            }
            if let Some(tier) = tier {
                let tier_str = match tier {
                    ProviderTier::Paid => "paid",
                    ProviderTier::Free => "free",
                    ProviderTier::Unknown => "unknown",
                };
                c.execute(
                    "UPDATE provider_balance SET tier = ?1 WHERE provider = ?2",
                    params![tier_str, provider],
                )?;
            }
            if let Some(currency) = currency {
                c.execute(
                    "UPDATE provider_balance SET currency = ?1 WHERE provider = ?2",
                    params![currency.code(), provider],
                )?;
            }
            if let Some(notes) = notes {
                c.execute(
                    "UPDATE provider_balance SET notes = ?1 WHERE provider = ?2",
                    params![notes, provider],
                )?;
            }
            Ok(())
        })?;
        info!(provider, balance = ?known_balance, "provider balance updated");
        Ok(())
    }

    /// Register a new provider (or update an existing one).
    pub fn add_provider(
        &self,
        provider: &str,
        known_balance: Option<f64>,
        tier: ProviderTier,
        currency: Currency,
        notes: Option<&str>,
    ) -> Result<()> {
        self.update_provider_balance(provider, known_balance, Some(tier), Some(currency), notes, false)
    }

    /// `true` when the estimated cost fits in what is left.
    pub fn can_spend(&self, estimated_cost: f64) -> Result<bool> {
        Ok(self.get_status()?.remaining >= estimated_cost)
    }

    /// Recommend a tier from per-provider paid balances, with a free-tier
    /// floor: as long as any free provider exists the recommendation
    /// never drops below `level2`, because free capable models keep the
    /// agent productive regardless of paid budget.
    pub fn recommended_tier(&self) -> Result<Tier> {
        let status = self.get_status()?;
        let mut paid_remaining = 0.0;
        let mut has_free = false;
        for p in &status.providers {
            if p.tier == ProviderTier::Free {
                has_free = true;
                continue;
            }
            if p.currency.is_monetary() {
                if let Some(est) = p.estimated_remaining {
                    paid_remaining += est;
                }
            }
        }
        // No declared balances at all: fall back to the cap-based figure.
        if status.providers.iter().all(|p| p.known_balance.is_none()) {
            paid_remaining = status.remaining;
        }

        let from_paid = if paid_remaining > 5.0 {
            Tier::Level1
        } else if paid_remaining > 2.0 {
            Tier::Level2
        } else if paid_remaining > 1.0 {
            Tier::Level3
        } else {
            Tier::LocalOnly
        };

        let recommended = if has_free && from_paid.is_below(Tier::Level2) {
            Tier::Level2
        } else {
            from_paid
        };
        if recommended != Tier::Level1 {
            warn!(
                paid_remaining = format!("{paid_remaining:.2}"),
                has_free,
                tier = %recommended,
                "budget constrains model tier"
            );
        }
        Ok(recommended)
    }

    /// Recent usage rows, newest first.
    pub fn recent_usage(&self, limit: usize) -> Result<Vec<UsageRecord>> {
        self.db.with_conn(|c| {
            let mut stmt = c.prepare(
                "SELECT timestamp, provider, model, input_tokens, output_tokens, cost_usd,
                        task_description
                 FROM budget_usage ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(UsageRecord {
                    timestamp: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(0)?)
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    provider: row.get(1)?,
                    model: row.get(2)?,
                    input_tokens: row.get::<_, i64>(3)? as u64,
                    output_tokens: row.get::<_, i64>(4)? as u64,
                    cost_usd: row.get(5)?,
                    task_description: row.get(6)?,
                })
            })?;
            rows.collect()
        })
    }
}

/// Reset the monthly total when the calendar month changed. Runs inside
/// the caller's transaction so the reset and the triggering usage record
/// land together.
fn roll_month_if_needed(tx: &Transaction<'_>, month: &str) -> rusqlite::Result<()> {
    let stored: Option<String> = tx
        .query_row("SELECT current_month FROM budget_config WHERE id = 1", [], |row| {
            row.get(0)
        })
        .optional()?;
    if stored.as_deref() != Some(month) {
        tx.execute(
            "UPDATE budget_config SET current_month = ?1, current_month_total = 0 WHERE id = 1",
            params![month],
        )?;
    }
    Ok(())
}
