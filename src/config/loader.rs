//! Configuration loader

use config::{Config, Environment, File};
use std::path::Path;

use super::types::{AppConfig, AppSettings, ExchangeConfig, StrategyConfig, TelegramConfig};
use crate::common::errors::{BotError, Result};

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. `BINANCE_API_KEY`, `BINANCE_API_SECRET`, `TELEGRAM_TOKEN`, `CHAT_ID`, `PORT`
/// 2. Environment variables (prefixed with APP__)
/// 3. Configuration file (TOML format)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    // Add environment variables with APP__ prefix
    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("strategy.pairs")
            .try_parsing(true),
    );

    // Conventional variable names take precedence over everything else
    builder = builder
        .set_override_option("exchange.api_key", env_var("BINANCE_API_KEY"))
        .and_then(|b| b.set_override_option("exchange.api_secret", env_var("BINANCE_API_SECRET")))
        .and_then(|b| b.set_override_option("telegram.token", env_var("TELEGRAM_TOKEN")))
        .and_then(|b| b.set_override_option("telegram.chat_id", env_var("CHAT_ID")))
        .and_then(|b| {
            b.set_override_option(
                "settings.health_bind_addr",
                env_var("PORT").map(|port| format!("0.0.0.0:{}", port)),
            )
        })
        .map_err(|e| BotError::Configuration(e.to_string()))?;

    let config: AppConfig = builder
        .build()
        .map_err(|e| BotError::Configuration(e.to_string()))?
        .try_deserialize()
        .map_err(|e| BotError::Configuration(e.to_string()))?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    let exchange = ExchangeConfig {
        api_key: env_var("BINANCE_API_KEY"),
        api_secret: env_var("BINANCE_API_SECRET"),
        ..ExchangeConfig::default()
    };

    let telegram = match (env_var("TELEGRAM_TOKEN"), env_var("CHAT_ID")) {
        (Some(token), Some(chat_id)) => Some(TelegramConfig {
            token,
            chat_id,
            api_url: "https://api.telegram.org".to_string(),
        }),
        _ => None,
    };

    let mut settings = AppSettings::default();
    if let Some(port) = env_var("PORT") {
        settings.health_bind_addr = format!("0.0.0.0:{}", port);
    }

    let config = AppConfig {
        exchange,
        telegram,
        strategy: StrategyConfig::default(),
        settings,
    };
    config.validate()?;
    Ok(config)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
