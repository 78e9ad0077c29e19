//! Thread-safe cost tracker: prices completion calls, keeps daily and
//! monthly running totals, and raises budget alerts.

use crate::model::{CostAlert, Recorded, UsageRecord, UsageSnapshot};
use crate::pricing::PricingTable;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::sync::{PoisonError, RwLock};
use tellerbot_core::Usage;

/// Default alert thresholds, in percent of the daily budget.
pub const DEFAULT_THRESHOLDS: [u8; 4] = [50, 75, 90, 100];

/// Running cost totals with day and month rollover.
///
/// The daily counters carry the local date they belong to. Every write
/// compares that stamp against the date of the write and resets the daily
/// counters (and the fired alerts) when they differ, so no background timer
/// is needed.
pub struct CostTracker {
    pricing: PricingTable,
    daily_budget_usd: f64,
    thresholds: Vec<u8>,
    utc_offset: Duration,
    totals: RwLock<RunningTotals>,
}

#[derive(Debug)]
struct RunningTotals {
    total_cost: f64,
    total_requests: u64,
    current_day: NaiveDate,
    daily_cost: f64,
    daily_tokens: u64,
    /// Thresholds already fired for `current_day`.
    fired_today: Vec<u8>,
    exhausted_today: bool,
    current_month: (i32, u32),
    monthly_cost: f64,
}

impl RunningTotals {
    fn starting(day: NaiveDate) -> Self {
        Self {
            total_cost: 0.0,
            total_requests: 0,
            current_day: day,
            daily_cost: 0.0,
            daily_tokens: 0,
            fired_today: Vec::new(),
            exhausted_today: false,
            current_month: (day.year(), day.month()),
            monthly_cost: 0.0,
        }
    }

    fn roll_over(&mut self, day: NaiveDate) {
        if day != self.current_day {
            self.current_day = day;
            self.daily_cost = 0.0;
            self.daily_tokens = 0;
            self.fired_today.clear();
            self.exhausted_today = false;
        }
        let month = (day.year(), day.month());
        if month != self.current_month {
            self.current_month = month;
            self.monthly_cost = 0.0;
        }
    }
}

impl CostTracker {
    /// Create a tracker with a $10 daily budget and UTC day boundaries.
    pub fn new(pricing: PricingTable) -> Self {
        Self {
            pricing,
            daily_budget_usd: 10.0,
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            utc_offset: Duration::zero(),
            totals: RwLock::new(RunningTotals::starting(Utc::now().date_naive())),
        }
    }

    /// Daily budget in USD. Zero disables alerts and degradation.
    pub fn with_daily_budget(mut self, usd: f64) -> Self {
        self.daily_budget_usd = usd.max(0.0);
        self
    }

    pub fn with_thresholds(mut self, mut thresholds: Vec<u8>) -> Self {
        thresholds.sort_unstable();
        thresholds.dedup();
        self.thresholds = thresholds;
        self
    }

    /// Shift the daily reset to local midnight at a fixed UTC offset.
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> Self {
        self.utc_offset = Duration::minutes(minutes as i64);
        let today = self.local_day(Utc::now());
        self.write_totals().current_day = today;
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn daily_budget_usd(&self) -> f64 {
        self.daily_budget_usd
    }

    fn local_day(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + self.utc_offset).date_naive()
    }

    fn write_totals(&self) -> std::sync::RwLockWriteGuard<'_, RunningTotals> {
        self.totals.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_totals(&self) -> std::sync::RwLockReadGuard<'_, RunningTotals> {
        self.totals.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a completed call now.
    pub fn record(&self, usage: &Usage, model: &str) -> Recorded {
        self.record_at(usage, model, Utc::now())
    }

    /// Record a completed call at an explicit instant.
    pub fn record_at(&self, usage: &Usage, model: &str, now: DateTime<Utc>) -> Recorded {
        let cost = self
            .pricing
            .compute_cost(model, usage.prompt_tokens, usage.completion_tokens);
        let record = UsageRecord::new(
            model,
            usage.prompt_tokens,
            usage.completion_tokens,
            cost,
            now,
        );

        let mut alerts = Vec::new();
        {
            let mut totals = self.write_totals();
            totals.roll_over(self.local_day(now));

            totals.total_cost += cost;
            totals.total_requests += 1;
            totals.daily_cost += cost;
            totals.daily_tokens += record.total_tokens as u64;
            totals.monthly_cost += cost;

            if self.daily_budget_usd > 0.0 {
                for &pct in &self.thresholds {
                    if totals.fired_today.contains(&pct) {
                        continue;
                    }
                    if totals.daily_cost >= self.daily_budget_usd * pct as f64 / 100.0 {
                        totals.fired_today.push(pct);
                        alerts.push(CostAlert {
                            threshold_pct: pct,
                            daily_cost_usd: totals.daily_cost,
                            daily_budget_usd: self.daily_budget_usd,
                            fired_at: now,
                        });
                    }
                }
                if totals.daily_cost >= self.daily_budget_usd {
                    totals.exhausted_today = true;
                }
            }
        }

        for alert in &alerts {
            if alert.is_exhausted() {
                tracing::error!(
                    threshold = alert.threshold_pct,
                    daily_cost = alert.daily_cost_usd,
                    budget = alert.daily_budget_usd,
                    "Daily budget exhausted, switching to degraded mode"
                );
            } else {
                tracing::warn!(
                    threshold = alert.threshold_pct,
                    daily_cost = alert.daily_cost_usd,
                    budget = alert.daily_budget_usd,
                    "Daily budget threshold crossed"
                );
            }
        }

        tracing::debug!(
            model = %model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            cost_usd = cost,
            "Recorded usage"
        );

        Recorded { record, alerts }
    }

    /// Whether today's budget has been exhausted.
    pub fn is_degraded(&self) -> bool {
        self.is_degraded_at(Utc::now())
    }

    pub fn is_degraded_at(&self, now: DateTime<Utc>) -> bool {
        let totals = self.read_totals();
        totals.current_day == self.local_day(now) && totals.exhausted_today
    }

    /// Current totals. Daily figures read as zero once the day has turned,
    /// even before the next write resets them.
    pub fn snapshot(&self) -> UsageSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> UsageSnapshot {
        let totals = self.read_totals();
        let day = self.local_day(now);
        let same_day = totals.current_day == day;
        let same_month = totals.current_month == (day.year(), day.month());

        UsageSnapshot {
            daily_cost_usd: if same_day { totals.daily_cost } else { 0.0 },
            monthly_cost_usd: if same_month { totals.monthly_cost } else { 0.0 },
            total_cost_usd: totals.total_cost,
            daily_tokens: if same_day { totals.daily_tokens } else { 0 },
            requests: totals.total_requests,
            daily_budget_usd: self.daily_budget_usd,
            alerts_fired: if same_day {
                totals.fired_today.clone()
            } else {
                Vec::new()
            },
            degraded: same_day && totals.exhausted_today,
        }
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new(PricingTable::with_defaults())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn tracker(budget: f64) -> CostTracker {
        CostTracker::default().with_daily_budget(budget)
    }

    #[test]
    fn cost_is_additive() {
        let t = tracker(100.0);
        let now = at(2026, 3, 10, 12);
        let a = t.record_at(&Usage::new(1000, 500), "gpt-3.5-turbo", now);
        let b = t.record_at(&Usage::new(2000, 1000), "gpt-4", now);

        assert!((a.record.cost_usd - 0.0025).abs() < 1e-12);
        assert!((b.record.cost_usd - 0.12).abs() < 1e-12);

        let snap = t.snapshot_at(now);
        assert!((snap.daily_cost_usd - (a.record.cost_usd + b.record.cost_usd)).abs() < 1e-12);
        assert!((snap.monthly_cost_usd - snap.daily_cost_usd).abs() < 1e-12);
        assert_eq!(snap.daily_tokens, 4500);
        assert_eq!(snap.requests, 2);
    }

    #[test]
    fn each_threshold_fires_once_per_day() {
        // 1000 prompt tokens on gpt-4 = $0.03; budget $0.11
        let t = tracker(0.11);
        let now = at(2026, 3, 10, 9);
        let usage = Usage::new(1000, 0);

        let fired: Vec<Vec<u8>> = (0..6)
            .map(|_| {
                t.record_at(&usage, "gpt-4", now)
                    .alerts
                    .iter()
                    .map(|a| a.threshold_pct)
                    .collect()
            })
            .collect();

        // $0.03, $0.06 (50), $0.09 (75), $0.12 (90, 100), then nothing
        assert_eq!(fired[0], Vec::<u8>::new());
        assert_eq!(fired[1], vec![50]);
        assert_eq!(fired[2], vec![75]);
        assert_eq!(fired[3], vec![90, 100]);
        assert!(fired[4].is_empty());
        assert!(fired[5].is_empty());
        assert!(t.is_degraded_at(now));
        assert_eq!(t.snapshot_at(now).alerts_fired, vec![50, 75, 90, 100]);
    }

    #[test]
    fn large_call_fires_every_crossed_threshold() {
        let t = tracker(0.01);
        let recorded = t.record_at(&Usage::new(1000, 0), "gpt-4", at(2026, 3, 10, 9));
        let pcts: Vec<u8> = recorded.alerts.iter().map(|a| a.threshold_pct).collect();
        assert_eq!(pcts, vec![50, 75, 90, 100]);
    }

    #[test]
    fn daily_totals_reset_at_midnight() {
        let t = tracker(0.05);
        let day1 = at(2026, 3, 10, 23);
        t.record_at(&Usage::new(2000, 0), "gpt-4", day1);
        assert!(t.is_degraded_at(day1));

        let day2 = at(2026, 3, 11, 0);
        // Before any write the snapshot already reports the new day.
        assert_eq!(t.snapshot_at(day2).daily_cost_usd, 0.0);
        assert!(!t.is_degraded_at(day2));

        let recorded = t.record_at(&Usage::new(1000, 0), "gpt-4", day2);
        assert_eq!(
            recorded.alerts.iter().map(|a| a.threshold_pct).collect::<Vec<_>>(),
            vec![50]
        );
        let snap = t.snapshot_at(day2);
        assert!((snap.daily_cost_usd - 0.03).abs() < 1e-12);
        assert!((snap.monthly_cost_usd - 0.09).abs() < 1e-12);
        assert_eq!(snap.alerts_fired, vec![50]);
    }

    #[test]
    fn monthly_totals_reset_on_month_boundary() {
        let t = tracker(100.0);
        t.record_at(&Usage::new(1000, 0), "gpt-4", at(2026, 1, 31, 12));
        t.record_at(&Usage::new(1000, 0), "gpt-4", at(2026, 2, 1, 12));
        let snap = t.snapshot_at(at(2026, 2, 1, 13));
        assert!((snap.monthly_cost_usd - 0.03).abs() < 1e-12);
        assert!((snap.total_cost_usd - 0.06).abs() < 1e-12);
    }

    #[test]
    fn utc_offset_moves_day_boundary() {
        // UTC-5: 03:00 UTC on the 11th is still the 10th locally.
        let t = tracker(100.0).with_utc_offset_minutes(-300);
        t.record_at(&Usage::new(1000, 0), "gpt-4", at(2026, 3, 10, 20));
        t.record_at(&Usage::new(1000, 0), "gpt-4", at(2026, 3, 11, 3));
        let snap = t.snapshot_at(at(2026, 3, 11, 4));
        assert!((snap.daily_cost_usd - 0.06).abs() < 1e-12);

        // 05:00 UTC is local midnight.
        let snap = t.snapshot_at(at(2026, 3, 11, 5));
        assert_eq!(snap.daily_cost_usd, 0.0);
    }

    #[test]
    fn zero_budget_never_alerts() {
        let t = tracker(0.0);
        let now = at(2026, 3, 10, 9);
        let recorded = t.record_at(&Usage::new(100_000, 0), "gpt-4", now);
        assert!(recorded.alerts.is_empty());
        assert!(!t.is_degraded_at(now));
    }

    #[test]
    fn unknown_model_is_priced_at_default_tier() {
        let t = tracker(100.0);
        let r = t.record_at(&Usage::new(1000, 1000), "some-new-model", at(2026, 3, 10, 9));
        assert!((r.record.cost_usd - 0.0035).abs() < 1e-12);
    }
}
