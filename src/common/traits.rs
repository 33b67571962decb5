//! Trait definitions for the collaborators the trading core depends on

use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg(test)]
use mockall::automock;

use super::errors::Result;
use super::types::{FillResult, OrderHandle, OrderStatus, Pair, Signal};

/// Produces one market signal per pair per tick
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SignalSource: Send + Sync {
    /// Fetch the current signal for a pair
    ///
    /// Returns `BotError::DataUnavailable` when the underlying market data
    /// cannot support a decision this tick.
    async fn fetch(&self, pair: &Pair) -> Result<Signal>;
}

/// Order execution and account queries against a single exchange
///
/// Implementations normalize whatever the venue returns into
/// [`FillResult`] / [`OrderStatus`], so callers never inspect raw payloads.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Buy `quote_amount` worth of the base asset at market
    async fn market_buy(&self, pair: &Pair, quote_amount: Decimal) -> Result<FillResult>;

    /// Sell `quantity` of the base asset at market
    async fn market_sell(&self, pair: &Pair, quantity: Decimal) -> Result<FillResult>;

    /// Rest a good-till-cancelled limit sell
    async fn place_limit_sell(&self, pair: &Pair, quantity: Decimal, price: Decimal) -> Result<OrderHandle>;

    /// Cancel a resting order
    async fn cancel(&self, order: &OrderHandle) -> Result<()>;

    /// Current status of a previously placed order
    async fn query_order(&self, order: &OrderHandle) -> Result<OrderStatus>;

    /// Orders currently live for a pair
    async fn open_orders(&self, pair: &Pair) -> Result<Vec<OrderHandle>>;

    /// Smallest order notional the exchange accepts for a pair
    async fn min_notional(&self, pair: &Pair) -> Result<Decimal>;

    /// Free (unlocked) balance of an asset
    async fn free_balance(&self, asset: &str) -> Result<Decimal>;
}

/// Best-effort delivery of human-readable status text
///
/// Delivery failures are handled inside the implementation and never
/// reach the caller.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}
