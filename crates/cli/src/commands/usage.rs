//! Pricing and cost-estimate commands.

use tellerbot_config::AppConfig;
use tellerbot_telemetry::{ModelPricing, PricingTable};

/// Default table plus any `[telemetry.pricing]` overrides.
fn pricing_table(config: &AppConfig) -> Result<PricingTable, Box<dyn std::error::Error>> {
    let table = PricingTable::with_defaults();
    for (model, p) in &config.telemetry.pricing {
        table.set(model.clone(), ModelPricing::new(p.input_per_1k, p.output_per_1k))?;
    }
    Ok(table)
}

/// List model pricing.
pub async fn pricing() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let table = pricing_table(&config)?;
    print!("{}", render_pricing(&table));
    Ok(())
}

fn render_pricing(table: &PricingTable) -> String {
    let mut out = String::new();
    out.push_str("Model pricing (USD per 1K tokens)\n");
    out.push_str(&format!("{:<32} {:>10} {:>10}\n", "Model", "Input", "Output"));
    for (name, p) in table.entries() {
        out.push_str(&format!(
            "{:<32} ${:>9.4} ${:>9.4}\n",
            name, p.input_per_1k, p.output_per_1k
        ));
    }
    out.push_str(&format!("\n  {} models with pricing data\n", table.len()));
    out
}

/// Estimate cost for a given model and token counts.
pub async fn estimate(
    model: &str,
    input_tokens: u32,
    output_tokens: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let table = pricing_table(&config)?;
    print!("{}", render_estimate(&table, model, input_tokens, output_tokens));
    Ok(())
}

fn render_estimate(table: &PricingTable, model: &str, input: u32, output: u32) -> String {
    let lookup = table.lookup(model);
    let cost = lookup.pricing.cost(input, output);
    let mut out = String::new();
    if !lookup.known {
        out.push_str(&format!(
            "Model '{model}' has no pricing entry; using the default tier.\n"
        ));
    }
    out.push_str(&format!("Cost estimate for {model}\n"));
    out.push_str(&format!("   Input tokens:   {input}\n"));
    out.push_str(&format!("   Output tokens:  {output}\n"));
    out.push_str(&format!("   Estimated cost: ${cost:.6}\n"));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_lists_default_tiers() {
        let out = render_pricing(&PricingTable::with_defaults());
        assert!(out.contains("gpt-3.5-turbo"));
        assert!(out.contains("gpt-4"));
        assert!(out.contains("2 models"));
    }

    #[test]
    fn estimate_known_model() {
        let out = render_estimate(&PricingTable::with_defaults(), "gpt-4", 1000, 1000);
        assert!(out.contains("$0.090000"));
        assert!(!out.contains("default tier"));
    }

    #[test]
    fn estimate_unknown_model_uses_default_tier() {
        let out = render_estimate(&PricingTable::with_defaults(), "mystery-llm", 1000, 1000);
        assert!(out.contains("default tier"));
        assert!(out.contains("$0.003500"));
    }

    #[test]
    fn overrides_extend_table() {
        let mut config = AppConfig::default();
        config.telemetry.pricing.insert(
            "gpt-4o".into(),
            tellerbot_config::PricingOverrideConfig {
                input_per_1k: 0.005,
                output_per_1k: 0.015,
            },
        );
        let table = pricing_table(&config).unwrap();
        assert_eq!(table.len(), 3);
    }
}
