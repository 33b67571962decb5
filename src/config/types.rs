//! Configuration types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::common::errors::{BotError, Result};
use crate::common::types::Pair;
use crate::strategy::TakeProfitMode;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Exchange connection configuration
    #[serde(default)]
    pub exchange: ExchangeConfig,
    /// Telegram notification configuration (log-only when absent)
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    /// Trading strategy parameters
    #[serde(default)]
    pub strategy: StrategyConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

impl AppConfig {
    /// Check the configuration for values the bot cannot trade with
    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;

        if let Some(telegram) = &self.telegram {
            if telegram.token.trim().is_empty() || telegram.chat_id.trim().is_empty() {
                return Err(BotError::Configuration(
                    "telegram section requires both token and chat_id".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Exchange (Binance spot) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// API key for signed requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// API secret for signing requests
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Base URL for the REST API
    #[serde(default = "default_exchange_rest_url")]
    pub rest_url: String,
    /// Validity window for signed requests in milliseconds
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            rest_url: default_exchange_rest_url(),
            recv_window_ms: default_recv_window(),
        }
    }
}

fn default_exchange_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_recv_window() -> u64 {
    5000
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token
    pub token: String,
    /// Destination chat
    pub chat_id: String,
    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

/// Strategy parameters: entry rule, safety-order ladder and take-profit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Pairs to trade, written BASE/QUOTE
    #[serde(default = "default_pairs")]
    pub pairs: Vec<String>,
    /// Candle interval used for indicators
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_ema_period")]
    pub ema_period: usize,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    /// Band width in ATRs around the EMA
    #[serde(default = "default_atr_multiplier")]
    pub atr_multiplier: Decimal,
    /// Enter when RSI is at or below this value
    #[serde(default = "default_rsi_entry_threshold")]
    pub rsi_entry_threshold: f64,
    /// Quote amount of the initial buy
    #[serde(default = "default_entry_notional")]
    pub entry_notional: Decimal,
    /// Quote amount of the first safety order
    #[serde(default = "default_first_safety_order_amount")]
    pub first_safety_order_amount: Decimal,
    /// Growth factor between consecutive safety orders
    #[serde(default = "default_safety_order_multiplier")]
    pub safety_order_multiplier: Decimal,
    /// Maximum safety orders per position
    #[serde(default = "default_safety_order_count")]
    pub safety_order_count: usize,
    /// Take-profit distance above the average price, as a fraction
    #[serde(default = "default_profit_target")]
    pub profit_target: Decimal,
    /// Drop below the average price that fires the first safety order
    #[serde(default = "default_initial_safety_order_drop")]
    pub initial_safety_order_drop: Decimal,
    /// Starting value of the capital account
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
    /// How the take-profit target is executed
    #[serde(default)]
    pub take_profit_mode: TakeProfitMode,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            pairs: default_pairs(),
            candle_interval: default_candle_interval(),
            rsi_period: default_rsi_period(),
            ema_period: default_ema_period(),
            atr_period: default_atr_period(),
            atr_multiplier: default_atr_multiplier(),
            rsi_entry_threshold: default_rsi_entry_threshold(),
            entry_notional: default_entry_notional(),
            first_safety_order_amount: default_first_safety_order_amount(),
            safety_order_multiplier: default_safety_order_multiplier(),
            safety_order_count: default_safety_order_count(),
            profit_target: default_profit_target(),
            initial_safety_order_drop: default_initial_safety_order_drop(),
            initial_capital: default_initial_capital(),
            take_profit_mode: TakeProfitMode::default(),
        }
    }
}

impl StrategyConfig {
    /// Parse the configured pair identifiers
    pub fn parsed_pairs(&self) -> Result<Vec<Pair>> {
        self.pairs.iter().map(|p| Pair::parse(p)).collect()
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        let pairs = self.parsed_pairs()?;
        if pairs.is_empty() {
            return Err(BotError::Configuration("at least one trading pair is required".to_string()));
        }

        if self.rsi_period == 0 || self.ema_period == 0 || self.atr_period == 0 {
            return Err(BotError::Configuration(
                "indicator periods must be greater than zero".to_string(),
            ));
        }

        let positive = [
            ("atr_multiplier", self.atr_multiplier),
            ("entry_notional", self.entry_notional),
            ("first_safety_order_amount", self.first_safety_order_amount),
            ("safety_order_multiplier", self.safety_order_multiplier),
            ("profit_target", self.profit_target),
        ];
        for (name, value) in positive {
            if value <= Decimal::ZERO {
                return Err(BotError::Configuration(format!("{} must be positive, got {}", name, value)));
            }
        }

        if self.initial_safety_order_drop <= Decimal::ZERO || self.initial_safety_order_drop >= Decimal::ONE {
            return Err(BotError::Configuration(format!(
                "initial_safety_order_drop must be between 0 and 1, got {}",
                self.initial_safety_order_drop
            )));
        }

        // The deepest rung must still leave a positive trigger price.
        if self.safety_order_count > 0 {
            let deepest = (1..self.safety_order_count)
                .fold(self.initial_safety_order_drop, |drop, _| drop * dec!(2));
            if deepest >= Decimal::ONE {
                return Err(BotError::Configuration(format!(
                    "safety order #{} would need a {}% drop; reduce safety_order_count or initial_safety_order_drop",
                    self.safety_order_count,
                    deepest * dec!(100)
                )));
            }
        }

        Ok(())
    }
}

fn default_pairs() -> Vec<String> {
    ["FTT/USDT", "ALPACA/USDT", "PEPE/USDT", "TIA/USDT"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_candle_interval() -> String {
    "3m".to_string()
}

fn default_rsi_period() -> usize {
    10
}

fn default_ema_period() -> usize {
    10
}

fn default_atr_period() -> usize {
    14
}

fn default_atr_multiplier() -> Decimal {
    dec!(2)
}

fn default_rsi_entry_threshold() -> f64 {
    30.0
}

fn default_entry_notional() -> Decimal {
    dec!(10)
}

fn default_first_safety_order_amount() -> Decimal {
    dec!(30)
}

fn default_safety_order_multiplier() -> Decimal {
    dec!(2)
}

fn default_safety_order_count() -> usize {
    4
}

fn default_profit_target() -> Decimal {
    dec!(0.01)
}

fn default_initial_safety_order_drop() -> Decimal {
    dec!(0.02)
}

fn default_initial_capital() -> Decimal {
    dec!(500)
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Delay between the end of one tick and the start of the next
    #[serde(default = "default_tick_interval")]
    pub tick_interval_seconds: u64,
    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// Address the liveness endpoint binds to
    #[serde(default = "default_health_bind_addr")]
    pub health_bind_addr: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_seconds: default_tick_interval(),
            request_timeout_seconds: default_request_timeout(),
            health_bind_addr: default_health_bind_addr(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_health_bind_addr() -> String {
    "0.0.0.0:5000".to_string()
}

/// API credentials for signed requests
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self { api_key, api_secret }
    }
}
