//! Model pricing table.
//!
//! Prices are in USD per 1,000 tokens, split into input (prompt) and
//! output (completion). The table is plain data: adding a model never
//! requires a code change, and config can override any entry at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::TelemetryError;

/// Model that prices unknown models.
pub const DEFAULT_TIER: &str = "gpt-3.5-turbo";

/// Per-1K-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1K input tokens in USD.
    pub input_per_1k: f64,
    /// Price per 1K output tokens in USD.
    pub output_per_1k: f64,
}

impl ModelPricing {
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_1k + output_tokens as f64 * self.output_per_1k)
            / 1_000.0
    }

    fn is_valid(&self) -> bool {
        self.input_per_1k.is_finite()
            && self.output_per_1k.is_finite()
            && self.input_per_1k >= 0.0
            && self.output_per_1k >= 0.0
    }
}

/// How a model name was resolved against the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceLookup {
    pub pricing: ModelPricing,
    /// False when the model was unknown and the default tier was used.
    pub known: bool,
}

/// Thread-safe pricing table with built-in tiers and runtime overrides.
pub struct PricingTable {
    prices: RwLock<HashMap<String, ModelPricing>>,
}

impl PricingTable {
    /// Built-in tiers: standard (`gpt-3.5-turbo`) and premium (`gpt-4`).
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();
        prices.insert(DEFAULT_TIER.into(), ModelPricing::new(0.0015, 0.002));
        prices.insert("gpt-4".into(), ModelPricing::new(0.03, 0.06));

        Self {
            prices: RwLock::new(prices),
        }
    }

    pub fn empty() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
        }
    }

    /// Exact lookup.
    pub fn get(&self, model: &str) -> Option<ModelPricing> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        prices.get(model).copied()
    }

    /// Add or replace pricing for a model. Rejects negative or non-finite prices.
    pub fn set(&self, model: impl Into<String>, pricing: ModelPricing) -> Result<(), TelemetryError> {
        let model = model.into();
        if !pricing.is_valid() {
            return Err(TelemetryError::InvalidPricing(model));
        }
        let mut prices = self.prices.write().unwrap_or_else(PoisonError::into_inner);
        prices.insert(model, pricing);
        Ok(())
    }

    /// Resolve a model name to its pricing.
    ///
    /// Tries an exact match, then the bare name without a provider prefix
    /// (`openai/gpt-4` → `gpt-4`), then the longest table key that prefixes
    /// the bare name (`gpt-3.5-turbo-0125` → `gpt-3.5-turbo`). Anything else
    /// falls back to the default tier with `known = false`.
    pub fn lookup(&self, model: &str) -> PriceLookup {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(p) = prices.get(model) {
            return PriceLookup { pricing: *p, known: true };
        }

        let lower = model.to_lowercase();
        let bare = lower.rsplit('/').next().unwrap_or(&lower);
        if let Some(p) = prices.get(bare) {
            return PriceLookup { pricing: *p, known: true };
        }

        let best = prices
            .iter()
            .filter(|(key, _)| bare.starts_with(&key.to_lowercase()))
            .max_by_key(|(key, _)| key.len());
        if let Some((_, p)) = best {
            return PriceLookup { pricing: *p, known: true };
        }

        let fallback = prices
            .get(DEFAULT_TIER)
            .copied()
            .unwrap_or(ModelPricing::new(0.0015, 0.002));
        PriceLookup {
            pricing: fallback,
            known: false,
        }
    }

    /// Cost of a call, pricing unknown models at the default tier with a warning.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        let lookup = self.lookup(model);
        if !lookup.known {
            tracing::warn!(model = %model, default_tier = DEFAULT_TIER, "Unknown model, pricing at default tier");
        }
        lookup.pricing.cost(input_tokens, output_tokens)
    }

    /// All (model, pricing) pairs sorted by model name.
    pub fn entries(&self) -> Vec<(String, ModelPricing)> {
        let prices = self.prices.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<_> = prices.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn len(&self) -> usize {
        self.prices.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
