//! Cost tracking and budget alerting for Tellerbot.
//!
//! Prices every completion call from a data-driven pricing table, keeps
//! daily and monthly spend, and fires threshold alerts against a daily
//! budget. Once the budget is exhausted the tracker reports itself as
//! degraded so callers can shape cheaper requests.

pub mod model;
pub mod pricing;
pub mod tracker;

pub use model::{CostAlert, Recorded, UsageRecord, UsageSnapshot};
pub use pricing::{ModelPricing, PricingTable};
pub use tracker::CostTracker;

/// Errors from the telemetry subsystem.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid pricing for model '{0}': prices must be finite and non-negative")]
    InvalidPricing(String),
}
