//! `tellerbot status`: Show configuration and probe dependencies.

use tellerbot_agent::ChatService;
use tellerbot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("Tellerbot status");
    println!("================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {} ({})", config.provider, config.base_url);
    println!("  Model:         {}", config.default_model);
    println!("  Budget model:  {}", config.budget_model);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Context:       {} tokens ({} for history)", config.context.total_tokens, config.history_budget());
    println!("  Cache:         {}", if config.cache.enabled { "in-memory" } else { "disabled" });
    println!("  Store:         {}", config.store.backend);
    println!("  Daily budget:  ${:.2}", config.telemetry.daily_budget_usd);
    println!("  Gateway:       {}:{}", config.gateway.host, config.gateway.port);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file; defaults in use (see `tellerbot config`)");
    }

    let service = ChatService::from_config(&config).await?;
    let health = service.health().await;
    println!();
    println!("  Completion endpoint: {}", mark(health.completion));
    println!("  Cache:               {}", mark(health.cache));
    println!("  Conversation store:  {}", mark(health.store));

    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok { "reachable" } else { "UNREACHABLE" }
}
