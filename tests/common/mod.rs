//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use dca_safety_bot::common::errors::{BotError, Result};
use dca_safety_bot::common::traits::{ExchangeGateway, Notifier, SignalSource};
use dca_safety_bot::common::types::{FillResult, OrderHandle, OrderStatus, Pair, Side, Signal};
use dca_safety_bot::config::types::StrategyConfig;
use dca_safety_bot::{TakeProfitMode, TradingController};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// A resting limit sell inside the fake book
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub handle: OrderHandle,
    pub status: OrderStatus,
}

#[derive(Debug, Default)]
struct MarketState {
    prices: HashMap<Pair, Decimal>,
    rsi: HashMap<Pair, f64>,
    unavailable: HashSet<Pair>,
    min_notional: Decimal,
    /// Buy commission, taken from the base asset received
    base_fee: Decimal,
    /// Free balances; coins in resting sells are locked and not counted
    balances: HashMap<String, Decimal>,
    orders: BTreeMap<u64, RestingOrder>,
    next_order_id: u64,
    fail_cancel: bool,
    fail_place: bool,
    market_buys: Vec<(Pair, Decimal)>,
    market_sells: Vec<(Pair, Decimal)>,
    cancels: Vec<u64>,
}

/// In-memory market acting as both signal source and exchange
///
/// Market orders fill at the current price. Resting sells lock their
/// quantity when placed and fill when the price is moved to or above their
/// limit.
pub struct FakeMarket {
    state: Mutex<MarketState>,
}

impl FakeMarket {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MarketState {
                min_notional: dec!(5),
                next_order_id: 1,
                ..MarketState::default()
            }),
        })
    }

    /// Move the price and fill any resting sell at or below it
    pub fn set_price(&self, pair: &Pair, price: Decimal) {
        let mut state = self.state.lock().unwrap();
        state.prices.insert(pair.clone(), price);

        for order in state.orders.values_mut() {
            if order.handle.pair == *pair && order.status == OrderStatus::Open && order.handle.price <= price {
                let quantity = order.handle.quantity;
                order.status = OrderStatus::Filled(FillResult {
                    average_price: order.handle.price,
                    filled_quantity: quantity,
                    cost: order.handle.price * quantity,
                });
            }
        }
    }

    pub fn set_rsi(&self, pair: &Pair, rsi: f64) {
        self.state.lock().unwrap().rsi.insert(pair.clone(), rsi);
    }

    pub fn set_unavailable(&self, pair: &Pair) {
        self.state.lock().unwrap().unavailable.insert(pair.clone());
    }

    pub fn set_min_notional(&self, min_notional: Decimal) {
        self.state.lock().unwrap().min_notional = min_notional;
    }

    /// Charge `fee` of every bought quantity, the way a spot exchange takes
    /// commission in the base asset
    pub fn set_base_fee(&self, fee: Decimal) {
        self.state.lock().unwrap().base_fee = fee;
    }

    pub fn fail_cancel(&self, fail: bool) {
        self.state.lock().unwrap().fail_cancel = fail;
    }

    pub fn fail_place(&self, fail: bool) {
        self.state.lock().unwrap().fail_place = fail;
    }

    /// Cancel an order behind the bot's back
    pub fn cancel_externally(&self, order_id: u64) {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if let Some(order) = state.orders.get_mut(&order_id) {
            if order.status == OrderStatus::Open {
                order.status = OrderStatus::Canceled;
                *state.balances.entry(order.handle.pair.base().to_string()).or_default() += order.handle.quantity;
            }
        }
    }

    /// Rest an order as if left behind by a previous run
    pub fn seed_order(&self, pair: &Pair, side: Side, price: Decimal, quantity: Decimal) -> u64 {
        Self::rest_order(&mut self.state.lock().unwrap(), pair, side, price, quantity)
    }

    fn rest_order(state: &mut MarketState, pair: &Pair, side: Side, price: Decimal, quantity: Decimal) -> u64 {
        let order_id = state.next_order_id;
        state.next_order_id += 1;
        state.orders.insert(
            order_id,
            RestingOrder {
                handle: OrderHandle {
                    pair: pair.clone(),
                    order_id,
                    side,
                    price,
                    quantity,
                },
                status: OrderStatus::Open,
            },
        );
        order_id
    }

    pub fn live_orders(&self, pair: &Pair) -> Vec<OrderHandle> {
        self.state
            .lock()
            .unwrap()
            .orders
            .values()
            .filter(|o| o.handle.pair == *pair && o.status == OrderStatus::Open)
            .map(|o| o.handle.clone())
            .collect()
    }

    pub fn market_buys(&self) -> Vec<(Pair, Decimal)> {
        self.state.lock().unwrap().market_buys.clone()
    }

    pub fn market_sells(&self) -> Vec<(Pair, Decimal)> {
        self.state.lock().unwrap().market_sells.clone()
    }

    pub fn cancels(&self) -> Vec<u64> {
        self.state.lock().unwrap().cancels.clone()
    }

    /// Free balance of `asset`
    pub fn balance(&self, asset: &str) -> Decimal {
        self.state.lock().unwrap().balances.get(asset).copied().unwrap_or_default()
    }

    fn price(state: &MarketState, pair: &Pair) -> Result<Decimal> {
        state
            .prices
            .get(pair)
            .copied()
            .ok_or_else(|| BotError::Exchange {
                code: -1121,
                message: format!("Invalid symbol {}", pair.symbol()),
            })
    }
}

#[async_trait]
impl SignalSource for FakeMarket {
    async fn fetch(&self, pair: &Pair) -> Result<Signal> {
        let state = self.state.lock().unwrap();
        if state.unavailable.contains(pair) {
            return Err(BotError::DataUnavailable("all closes are zero".to_string()));
        }
        let price = Self::price(&state, pair).map_err(|e| BotError::DataUnavailable(e.to_string()))?;
        let rsi = state.rsi.get(pair).copied().unwrap_or(25.0);
        Ok(Signal {
            rsi,
            ema: price + dec!(0.10),
            // price always sits under the lower band
            ema_lower_band: price + dec!(0.05),
            ema_upper_band: price + dec!(0.15),
            price,
        })
    }
}

#[async_trait]
impl ExchangeGateway for FakeMarket {
    async fn market_buy(&self, pair: &Pair, quote_amount: Decimal) -> Result<FillResult> {
        let mut state = self.state.lock().unwrap();
        let price = Self::price(&state, pair)?;
        let quantity = quote_amount / price;
        let received = quantity * (Decimal::ONE - state.base_fee);
        *state.balances.entry(pair.base().to_string()).or_default() += received;
        state.market_buys.push((pair.clone(), quote_amount));
        FillResult::from_totals(quantity, quote_amount)
    }

    async fn market_sell(&self, pair: &Pair, quantity: Decimal) -> Result<FillResult> {
        let mut state = self.state.lock().unwrap();
        let price = Self::price(&state, pair)?;
        *state.balances.entry(pair.base().to_string()).or_default() -= quantity;
        state.market_sells.push((pair.clone(), quantity));
        FillResult::from_totals(quantity, quantity * price)
    }

    async fn place_limit_sell(&self, pair: &Pair, quantity: Decimal, price: Decimal) -> Result<OrderHandle> {
        let mut state = self.state.lock().unwrap();
        let free = state.balances.get(pair.base()).copied().unwrap_or_default();
        if state.fail_place || quantity > free {
            return Err(BotError::Exchange {
                code: -2010,
                message: "Account has insufficient balance for requested action.".to_string(),
            });
        }
        *state.balances.entry(pair.base().to_string()).or_default() -= quantity;
        let order_id = Self::rest_order(&mut state, pair, Side::Sell, price, quantity);
        Ok(OrderHandle {
            pair: pair.clone(),
            order_id,
            side: Side::Sell,
            price,
            quantity,
        })
    }

    async fn cancel(&self, order: &OrderHandle) -> Result<()> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        if state.fail_cancel {
            return Err(BotError::Exchange {
                code: -1001,
                message: "Internal error; unable to process your request.".to_string(),
            });
        }
        match state.orders.get_mut(&order.order_id) {
            Some(resting) if resting.status == OrderStatus::Open => {
                resting.status = OrderStatus::Canceled;
                *state.balances.entry(resting.handle.pair.base().to_string()).or_default() += resting.handle.quantity;
                state.cancels.push(order.order_id);
                Ok(())
            }
            _ => Err(BotError::Exchange {
                code: -2011,
                message: "Unknown order sent.".to_string(),
            }),
        }
    }

    async fn query_order(&self, order: &OrderHandle) -> Result<OrderStatus> {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(&order.order_id)
            .map(|o| o.status.clone())
            .ok_or_else(|| BotError::Exchange {
                code: -2013,
                message: "Order does not exist.".to_string(),
            })
    }

    async fn open_orders(&self, pair: &Pair) -> Result<Vec<OrderHandle>> {
        Ok(self.live_orders(pair))
    }

    async fn min_notional(&self, _pair: &Pair) -> Result<Decimal> {
        Ok(self.state.lock().unwrap().min_notional)
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self.balance(asset))
    }
}

/// Notifier that keeps every message
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.messages.lock().unwrap().push(text.to_string());
    }
}

/// Strategy defaults restricted to `pairs`
pub fn strategy(pairs: &[&str], mode: TakeProfitMode) -> StrategyConfig {
    StrategyConfig {
        pairs: pairs.iter().map(|p| p.to_string()).collect(),
        take_profit_mode: mode,
        ..StrategyConfig::default()
    }
}

pub fn pair(value: &str) -> Pair {
    Pair::parse(value).unwrap()
}

/// Controller wired to a fake market and a recording notifier
pub fn controller(
    config: &StrategyConfig,
) -> (TradingController, Arc<FakeMarket>, Arc<RecordingNotifier>) {
    let market = FakeMarket::new();
    let notifier = RecordingNotifier::new();
    let controller = TradingController::from_config(config, market.clone(), market.clone(), notifier.clone())
        .expect("valid strategy config");
    (controller, market, notifier)
}
