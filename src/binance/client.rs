//! Binance spot client implementing the exchange gateway

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::messages::{OrderResponse, SymbolFilter, SymbolInfo};
use super::rest::BinanceRestClient;
use crate::common::errors::{BotError, Result};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{FillResult, OrderHandle, OrderStatus, Pair, Side, SymbolRules};
use crate::config::types::{ApiCredentials, ExchangeConfig};

/// Binance spot client
///
/// Wraps [`BinanceRestClient`] and normalizes order payloads into
/// [`FillResult`] / [`OrderStatus`]. Symbol rules are fetched once per
/// symbol and cached.
pub struct BinanceClient {
    /// REST API client
    rest_client: BinanceRestClient,
    /// Trading rules keyed by exchange symbol
    rules: RwLock<HashMap<String, SymbolRules>>,
}

impl BinanceClient {
    /// Create a new Binance client from configuration
    pub fn new(config: &ExchangeConfig, timeout: Duration) -> Result<Self> {
        let rest_client = BinanceRestClient::with_timeout(&config.rest_url, timeout)?
            .with_recv_window(config.recv_window_ms);

        let rest_client = match (&config.api_key, &config.api_secret) {
            (Some(key), Some(secret)) => {
                rest_client.with_credentials(ApiCredentials::new(key.clone(), secret.clone()))
            }
            _ => rest_client,
        };

        Ok(Self::from_rest(rest_client))
    }

    /// Wrap an already configured REST client
    pub fn from_rest(rest_client: BinanceRestClient) -> Self {
        Self {
            rest_client,
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Get a reference to the REST client
    pub fn rest(&self) -> &BinanceRestClient {
        &self.rest_client
    }

    /// Fetch and cache trading rules for every pair
    #[instrument(skip(self, pairs))]
    pub async fn load_markets(&self, pairs: &[Pair]) -> Result<()> {
        for pair in pairs {
            let rules = self.fetch_rules(pair).await?;
            info!(%pair, min_notional = %rules.min_notional, step_size = %rules.step_size, tick_size = %rules.tick_size, "Loaded market");
        }
        Ok(())
    }

    /// Cached rules for a pair, fetching them on first use
    pub async fn symbol_rules(&self, pair: &Pair) -> Result<SymbolRules> {
        if let Some(rules) = self.rules.read().await.get(&pair.symbol()) {
            return Ok(*rules);
        }
        self.fetch_rules(pair).await
    }

    async fn fetch_rules(&self, pair: &Pair) -> Result<SymbolRules> {
        let symbol = pair.symbol();
        let info = self.rest_client.get_symbol_info(&symbol).await?;
        let rules = rules_from_info(&info);
        self.rules.write().await.insert(symbol, rules);
        Ok(rules)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    #[instrument(skip(self), fields(pair = %pair))]
    async fn market_buy(&self, pair: &Pair, quote_amount: Decimal) -> Result<FillResult> {
        let params = [
            ("symbol", pair.symbol()),
            ("side", Side::Buy.to_string()),
            ("type", "MARKET".to_string()),
            ("quoteOrderQty", quote_amount.round_dp(8).normalize().to_string()),
        ];
        let order = self.rest_client.new_order(&params).await?;
        debug!(order_id = order.order_id, status = %order.status, "Market buy executed");
        fill_from_order(&order)
    }

    #[instrument(skip(self), fields(pair = %pair))]
    async fn market_sell(&self, pair: &Pair, quantity: Decimal) -> Result<FillResult> {
        let rules = self.symbol_rules(pair).await?;
        let quantity = rules.round_quantity(quantity);
        if quantity <= Decimal::ZERO {
            return Err(BotError::Internal(format!(
                "sell quantity for {} rounds to zero at lot step {}",
                pair, rules.step_size
            )));
        }

        let params = [
            ("symbol", pair.symbol()),
            ("side", Side::Sell.to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", quantity.to_string()),
        ];
        let order = self.rest_client.new_order(&params).await?;
        debug!(order_id = order.order_id, status = %order.status, "Market sell executed");
        fill_from_order(&order)
    }

    #[instrument(skip(self), fields(pair = %pair))]
    async fn place_limit_sell(&self, pair: &Pair, quantity: Decimal, price: Decimal) -> Result<OrderHandle> {
        let rules = self.symbol_rules(pair).await?;
        let quantity = rules.round_quantity(quantity);
        let price = rules.round_price(price);
        if quantity <= Decimal::ZERO || price <= Decimal::ZERO {
            return Err(BotError::Internal(format!(
                "limit sell for {} rounds to {} @ {}",
                pair, quantity, price
            )));
        }

        let params = [
            ("symbol", pair.symbol()),
            ("side", Side::Sell.to_string()),
            ("type", "LIMIT".to_string()),
            ("timeInForce", "GTC".to_string()),
            ("quantity", quantity.to_string()),
            ("price", price.to_string()),
        ];
        let order = self.rest_client.new_order(&params).await?;
        info!(order_id = order.order_id, %price, %quantity, "Limit sell resting");
        handle_from_order(pair, &order)
    }

    #[instrument(skip(self, order), fields(pair = %order.pair, order_id = order.order_id))]
    async fn cancel(&self, order: &OrderHandle) -> Result<()> {
        let response = self
            .rest_client
            .cancel_order(&order.pair.symbol(), order.order_id)
            .await?;
        debug!(status = %response.status, "Order cancelled");
        Ok(())
    }

    #[instrument(skip(self, order), fields(pair = %order.pair, order_id = order.order_id))]
    async fn query_order(&self, order: &OrderHandle) -> Result<OrderStatus> {
        let response = self.rest_client.get_order(&order.pair.symbol(), order.order_id).await?;
        status_from_order(&response)
    }

    async fn open_orders(&self, pair: &Pair) -> Result<Vec<OrderHandle>> {
        self.rest_client
            .get_open_orders(&pair.symbol())
            .await?
            .iter()
            .map(|order| handle_from_order(pair, order))
            .collect()
    }

    async fn min_notional(&self, pair: &Pair) -> Result<Decimal> {
        Ok(self.symbol_rules(pair).await?.min_notional)
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        let account = self.rest_client.get_account().await?;
        Ok(account
            .balances
            .into_iter()
            .find(|b| b.asset.eq_ignore_ascii_case(asset))
            .map(|b| b.free)
            .unwrap_or(Decimal::ZERO))
    }
}

/// Extract the filters the bot acts on
fn rules_from_info(info: &SymbolInfo) -> SymbolRules {
    let mut rules = SymbolRules {
        min_notional: Decimal::ZERO,
        step_size: Decimal::ZERO,
        tick_size: Decimal::ZERO,
    };
    for filter in &info.filters {
        match filter {
            SymbolFilter::PriceFilter { tick_size } => rules.tick_size = *tick_size,
            SymbolFilter::LotSize { step_size } => rules.step_size = *step_size,
            SymbolFilter::Notional { min_notional } | SymbolFilter::MinNotional { min_notional } => {
                rules.min_notional = rules.min_notional.max(*min_notional)
            }
            SymbolFilter::Other => {}
        }
    }
    rules
}

fn fill_from_order(order: &OrderResponse) -> Result<FillResult> {
    FillResult::from_totals(order.executed_qty, order.cummulative_quote_qty)
}

fn parse_side(side: &str) -> Result<Side> {
    match side {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(BotError::InvalidResponse(format!("Unknown order side: {}", other))),
    }
}

fn handle_from_order(pair: &Pair, order: &OrderResponse) -> Result<OrderHandle> {
    Ok(OrderHandle {
        pair: pair.clone(),
        order_id: order.order_id,
        side: parse_side(&order.side)?,
        price: order.price,
        quantity: order.orig_qty - order.executed_qty,
    })
}

fn status_from_order(order: &OrderResponse) -> Result<OrderStatus> {
    match order.status.as_str() {
        "NEW" | "PARTIALLY_FILLED" | "PENDING_NEW" => Ok(OrderStatus::Open),
        "FILLED" => Ok(OrderStatus::Filled(fill_from_order(order)?)),
        "CANCELED" | "REJECTED" | "EXPIRED" | "EXPIRED_IN_MATCH" => Ok(OrderStatus::Canceled),
        other => Err(BotError::InvalidResponse(format!("Unknown order status: {}", other))),
    }
}
