//! Atomic monthly budget reservation with rollback-on-overflow.
//!
//! The check-and-reserve is a single atomic increment followed by an atomic
//! compensating decrement when the limit is overshot, never a
//! read-check-write sequence. Safe for unlimited concurrent writers without
//! application-level locking; an overshoot is visible only for the duration
//! of the request that caused it.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use dashmap::DashMap;

use super::usage::UsageStore;
use crate::Result;

/// Micro-units per base currency unit; counters store fixed-point integers.
const MICROS: f64 = 1_000_000.0;

/// Spare TTL beyond the month boundary so late writes do not resurrect a
/// freshly expired key.
const TTL_SAFETY: Duration = Duration::from_secs(5 * 86_400);

/// Shared atomic float counter, keyed by string.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Atomically add `amount` (may be negative) and return the
    /// post-increment total.
    async fn incr_by(&self, key: &str, amount: f64) -> Result<f64>;

    /// Set the key's time-to-live if it does not already have one.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

/// In-process counter store for tests and single-process deployments.
///
/// Values are micro-units in an `AtomicI64`; the TTL deadline rides along as
/// epoch seconds and expired cells reset lazily on the next increment.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, CounterCell>,
}

#[derive(Debug, Default)]
struct CounterCell {
    micros: AtomicI64,
    expires_at_epoch_secs: AtomicU64,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_epoch_secs() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn incr_by(&self, key: &str, amount: f64) -> Result<f64> {
        let cell = self.counters.entry(key.to_string()).or_default();
        let deadline = cell.expires_at_epoch_secs.load(Ordering::Relaxed);
        if deadline != 0 && deadline < Self::now_epoch_secs() {
            cell.micros.store(0, Ordering::Relaxed);
            cell.expires_at_epoch_secs.store(0, Ordering::Relaxed);
        }
        let delta = (amount * MICROS).round() as i64;
        let total = cell.micros.fetch_add(delta, Ordering::Relaxed) + delta;
        Ok(total as f64 / MICROS)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        if let Some(cell) = self.counters.get(key) {
            let deadline = Self::now_epoch_secs() + ttl.as_secs();
            let _ = cell.expires_at_epoch_secs.compare_exchange(
                0,
                deadline,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
        }
        Ok(())
    }
}

/// Result of a reservation attempt.
///
/// On denial `new_total` is the post-increment total as it stood before the
/// compensating rollback, so callers can report an accurate used/limit
/// figure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    pub allowed: bool,
    pub new_total: f64,
}

/// Per-user monthly spend ledger.
///
/// The key embeds the year-month, so the ledger rolls over at month
/// boundaries with no reset job.
#[derive(Debug, Clone)]
pub struct BudgetLedger {
    store: Arc<dyn CounterStore>,
    usage: Arc<dyn UsageStore>,
    key_prefix: String,
}

impl BudgetLedger {
    pub fn new(store: Arc<dyn CounterStore>, usage: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            usage,
            key_prefix: "budget:".to_string(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn month_key(&self, user_id: &str, year_month: &str) -> String {
        format!("{}{}:{}", self.key_prefix, user_id, year_month)
    }

    /// Atomically reserve `amount` against `limit` for the current month.
    ///
    /// If the counter backend is unavailable, falls back to a non-atomic
    /// read-then-compare against the historical usage records. Concurrent
    /// correctness is best-effort in that degraded mode: two racing requests
    /// can both pass the check. This is a known race window, accepted in
    /// exchange for availability.
    pub async fn reserve(&self, user_id: &str, amount: f64, limit: f64) -> Reservation {
        let now = Utc::now();
        let year_month = format_year_month(now);
        let key = self.month_key(user_id, &year_month);

        match self.store.incr_by(&key, amount).await {
            Ok(new_total) => {
                if let Err(err) = self.store.expire(&key, ttl_for_month(now)).await {
                    tracing::warn!(error = %err, "failed to set budget key TTL");
                }
                if new_total > limit {
                    if let Err(err) = self.store.incr_by(&key, -amount).await {
                        tracing::warn!(
                            error = %err,
                            user_id,
                            "budget rollback failed, counter may overstate spend"
                        );
                    }
                    Reservation {
                        allowed: false,
                        new_total,
                    }
                } else {
                    Reservation {
                        allowed: true,
                        new_total,
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    user_id,
                    "budget counter unavailable, using non-atomic usage-history fallback"
                );
                let spent = match self.usage.monthly_spend(user_id, &year_month).await {
                    Ok(spent) => spent,
                    Err(err) => {
                        tracing::warn!(error = %err, "usage history unavailable, allowing request");
                        0.0
                    }
                };
                let new_total = spent + amount;
                Reservation {
                    allowed: new_total <= limit,
                    new_total,
                }
            }
        }
    }

    /// Release a previously reserved amount, e.g. when the request fails
    /// before reaching a provider.
    pub async fn release(&self, user_id: &str, amount: f64) -> Result<()> {
        let key = self.month_key(user_id, &format_year_month(Utc::now()));
        self.store.incr_by(&key, -amount).await.map(|_| ())
    }

    /// Current month spend as the counter sees it.
    pub async fn current_spend(&self, user_id: &str) -> Result<f64> {
        let key = self.month_key(user_id, &format_year_month(Utc::now()));
        self.store.incr_by(&key, 0.0).await
    }
}

fn format_year_month(now: DateTime<Utc>) -> String {
    now.format("%Y%m").to_string()
}

/// Key used by the ledger for the current month.
pub fn current_year_month() -> String {
    format_year_month(Utc::now())
}

/// Remainder of the current month plus a safety buffer.
fn ttl_for_month(now: DateTime<Utc>) -> Duration {
    let today = now.date_naive();
    let month_start =
        NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let next_month = month_start
        .checked_add_months(Months::new(1))
        .unwrap_or(month_start);
    let month_end = next_month.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();
    let remaining = (month_end - now).to_std().unwrap_or_default();
    remaining + TTL_SAFETY
}
