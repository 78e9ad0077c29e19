//! `tellerbot serve`: Start the HTTP API server.

use tellerbot_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Tellerbot gateway");
    println!("   Listening:  {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", config.default_model);
    println!("   Store:      {}", config.store.backend);
    println!(
        "   Rate limit: {}",
        match config.gateway.rate_limit_per_minute {
            0 => "disabled".to_string(),
            n => format!("{n} req/min per client"),
        }
    );

    tellerbot_gateway::start(config).await?;

    Ok(())
}
