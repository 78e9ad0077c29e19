//! `tellerbot config`: Print configuration.

use tellerbot_config::AppConfig;

/// Print the default configuration as TOML, or the config file path.
pub async fn run(path_only: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path_only {
        println!("{}", config_path().display());
    } else {
        print!("{}", AppConfig::default_toml());
    }
    Ok(())
}

fn config_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
