//! Data model for usage records, cost alerts, and usage snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Usage record ──────────────────────────────────────────────────────────

/// One completed, billed completion call. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub id: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_usd: f64,
    pub timestamp: DateTime<Utc>,
}

impl UsageRecord {
    pub(crate) fn new(
        model: impl Into<String>,
        prompt_tokens: u32,
        completion_tokens: u32,
        cost_usd: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model: model.into(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            cost_usd,
            timestamp,
        }
    }
}

// ── Alerts ────────────────────────────────────────────────────────────────

/// A daily-budget threshold crossing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostAlert {
    /// Threshold crossed, as a percentage of the daily budget.
    pub threshold_pct: u8,
    /// Daily spend at the moment of crossing.
    pub daily_cost_usd: f64,
    pub daily_budget_usd: f64,
    pub fired_at: DateTime<Utc>,
}

impl CostAlert {
    /// Whether this alert marks the budget as exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.threshold_pct >= 100
    }
}

impl std::fmt::Display for CostAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "daily spend ${:.4} crossed {}% of ${:.2} budget",
            self.daily_cost_usd, self.threshold_pct, self.daily_budget_usd
        )
    }
}

/// Result of recording one call: the record plus any alerts it triggered.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub record: UsageRecord,
    pub alerts: Vec<CostAlert>,
}

// ── Aggregated view ───────────────────────────────────────────────────────

/// A point-in-time usage snapshot (for the /v1/usage endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub daily_cost_usd: f64,
    pub monthly_cost_usd: f64,
    /// Lifetime cost since process start.
    pub total_cost_usd: f64,
    pub daily_tokens: u64,
    /// Lifetime number of recorded calls.
    pub requests: u64,
    pub daily_budget_usd: f64,
    /// Thresholds already fired today.
    pub alerts_fired: Vec<u8>,
    /// True once today's budget is exhausted.
    pub degraded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_totals_tokens() {
        let r = UsageRecord::new("gpt-4", 120, 30, 0.0054, Utc::now());
        assert_eq!(r.total_tokens, 150);
        assert_eq!(r.model, "gpt-4");
    }

    #[test]
    fn alert_display_and_exhaustion() {
        let alert = CostAlert {
            threshold_pct: 100,
            daily_cost_usd: 10.5,
            daily_budget_usd: 10.0,
            fired_at: Utc::now(),
        };
        assert!(alert.is_exhausted());
        assert_eq!(
            alert.to_string(),
            "daily spend $10.5000 crossed 100% of $10.00 budget"
        );

        let partial = CostAlert {
            threshold_pct: 75,
            ..alert
        };
        assert!(!partial.is_exhausted());
    }
}
