//! Signal source backed by exchange candles

use async_trait::async_trait;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::indicators::{average_true_range, ema, rsi, Candle};
use crate::binance::messages::KlineRow;
use crate::binance::rest::BinanceRestClient;
use crate::common::errors::{BotError, Result};
use crate::common::traits::SignalSource;
use crate::common::types::{Pair, Signal};
use crate::config::types::StrategyConfig;

/// Indicator windows and band width
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub interval: String,
    pub rsi_period: usize,
    pub ema_period: usize,
    pub atr_period: usize,
    pub atr_multiplier: Decimal,
}

impl IndicatorSettings {
    pub fn from_config(config: &StrategyConfig) -> Self {
        Self {
            interval: config.candle_interval.clone(),
            rsi_period: config.rsi_period,
            ema_period: config.ema_period,
            atr_period: config.atr_period,
            atr_multiplier: config.atr_multiplier,
        }
    }

    /// Candles requested per fetch
    pub fn candle_limit(&self) -> usize {
        self.rsi_period + self.atr_period + 1
    }
}

/// Computes RSI and an ATR band around the EMA from recent candles
pub struct KlineSignalSource {
    rest_client: BinanceRestClient,
    settings: IndicatorSettings,
}

impl KlineSignalSource {
    pub fn new(rest_client: BinanceRestClient, settings: IndicatorSettings) -> Self {
        Self { rest_client, settings }
    }
}

#[async_trait]
impl SignalSource for KlineSignalSource {
    #[instrument(skip(self), fields(pair = %pair))]
    async fn fetch(&self, pair: &Pair) -> Result<Signal> {
        let symbol = pair.symbol();
        let rows = self
            .rest_client
            .get_klines(&symbol, &self.settings.interval, self.settings.candle_limit())
            .await?;
        let candles = parse_candles(&rows)?;
        let ticker = self.rest_client.get_ticker_price(&symbol).await?;

        let signal = compute_signal(&candles, ticker.price, &self.settings)?;
        debug!(rsi = signal.rsi, ema = %signal.ema, price = %signal.price, "Computed signal");
        Ok(signal)
    }
}

fn parse_field(value: &str, name: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| BotError::DataUnavailable(format!("malformed candle {}: {}", name, value)))
}

/// Convert raw kline rows into candles
pub fn parse_candles(rows: &[KlineRow]) -> Result<Vec<Candle>> {
    rows.iter()
        .map(|row| {
            Ok(Candle::new(
                parse_field(&row.1, "open")?,
                parse_field(&row.2, "high")?,
                parse_field(&row.3, "low")?,
                parse_field(&row.4, "close")?,
            ))
        })
        .collect()
}

fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    Decimal::from_f64(value)
        .map(|d| d.round_dp(8))
        .ok_or_else(|| BotError::DataUnavailable(format!("{} is not a finite number", what)))
}

/// Compute the signal for the latest candle
pub fn compute_signal(candles: &[Candle], price: Decimal, settings: &IndicatorSettings) -> Result<Signal> {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    if closes.iter().all(|c| *c == 0.0) {
        return Err(BotError::DataUnavailable("all closes are zero".to_string()));
    }

    let insufficient = || {
        BotError::DataUnavailable(format!(
            "{} candles are not enough for the configured windows",
            candles.len()
        ))
    };
    let rsi = rsi(&closes, settings.rsi_period).ok_or_else(insufficient)?;
    let ema = ema(&closes, settings.ema_period).ok_or_else(insufficient)?;
    let atr = average_true_range(candles, settings.atr_period).ok_or_else(insufficient)?;

    let multiplier = settings
        .atr_multiplier
        .to_f64()
        .ok_or_else(|| BotError::Configuration("atr_multiplier out of range".to_string()))?;
    if !rsi.is_finite() {
        return Err(BotError::DataUnavailable("RSI is not a finite number".to_string()));
    }

    Ok(Signal {
        rsi: (rsi * 100.0).round() / 100.0,
        ema: to_decimal(ema, "EMA")?,
        ema_lower_band: to_decimal(ema - atr * multiplier, "lower band")?,
        ema_upper_band: to_decimal(ema + atr * multiplier, "upper band")?,
        price,
    })
}
