use rust_decimal::Decimal;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::common::errors::{BotError, Result};
use crate::common::traits::{ExchangeGateway, Notifier, SignalSource};
use crate::common::types::{FillResult, OrderHandle, OrderStatus, Pair, Side, Signal};
use crate::config::types::StrategyConfig;
use crate::strategy::accountant::CapitalAccountant;
use crate::strategy::ledger::PositionLedger;
use crate::strategy::planner::SafetyOrderPlanner;
use crate::strategy::take_profit::{RepegOutcome, TakeProfitManager};
use crate::strategy::types::{ClosedPosition, SafetyOrder, TakeProfitMode};

/// Entry rule: oversold RSI with price under the lower band
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryRule {
    pub rsi_threshold: f64,
    /// Quote amount of the initial buy
    pub entry_notional: Decimal,
}

impl EntryRule {
    pub fn is_met(&self, signal: &Signal) -> bool {
        signal.rsi <= self.rsi_threshold && signal.price < signal.ema_lower_band
    }
}

/// All mutable trading state, owned by the controller
#[derive(Debug, Clone)]
pub struct TradingState {
    pub ledger: PositionLedger,
    pub accountant: CapitalAccountant,
    halted: HashSet<Pair>,
}

impl TradingState {
    pub fn new(pairs: &[Pair], take_profit: TakeProfitManager, initial_capital: Decimal) -> Self {
        Self {
            ledger: PositionLedger::new(pairs, take_profit),
            accountant: CapitalAccountant::new(initial_capital),
            halted: HashSet::new(),
        }
    }

    /// Pairs halted after an invariant violation are never traded again
    pub fn is_halted(&self, pair: &Pair) -> bool {
        self.halted.contains(pair)
    }

    fn halt(&mut self, pair: &Pair) {
        self.halted.insert(pair.clone());
    }
}

/// Counters for one pass over the configured pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pairs with a usable signal
    pub evaluated: usize,
    /// Pairs skipped for missing data
    pub skipped: usize,
    pub opened: usize,
    pub safety_orders: usize,
    pub closed: usize,
    /// Steps that failed and were reported
    pub failures: usize,
    /// Pairs not processed because they are halted
    pub halted: usize,
}

/// Collaborators and fixed rules; never mutated after construction
struct TradingDesk {
    signals: Arc<dyn SignalSource>,
    exchange: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
    entry: EntryRule,
    planner: SafetyOrderPlanner,
    take_profit: TakeProfitManager,
}

/// Trading controller
///
/// Runs the per-pair state machine: FLAT -> OPEN on an entry fill, safety
/// orders while OPEN, back to FLAT when the take-profit fills. Pairs are
/// processed one after another and a failure in one never stops the rest.
pub struct TradingController {
    pairs: Vec<Pair>,
    desk: TradingDesk,
    state: TradingState,
}

impl TradingController {
    pub fn from_config(
        config: &StrategyConfig,
        signals: Arc<dyn SignalSource>,
        exchange: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let pairs = config.parsed_pairs()?;
        let take_profit = TakeProfitManager::new(config.profit_target, config.take_profit_mode);
        let state = TradingState::new(&pairs, take_profit, config.initial_capital);

        Ok(Self {
            pairs,
            desk: TradingDesk {
                signals,
                exchange,
                notifier,
                entry: EntryRule {
                    rsi_threshold: config.rsi_entry_threshold,
                    entry_notional: config.entry_notional,
                },
                planner: SafetyOrderPlanner::from_config(config),
                take_profit,
            },
            state,
        })
    }

    pub fn pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn state(&self) -> &TradingState {
        &self.state
    }

    pub fn planner(&self) -> &SafetyOrderPlanner {
        &self.desk.planner
    }

    /// Seed OPEN state from take-profit orders already resting on the exchange
    ///
    /// Returns the number of positions recovered.
    pub async fn reconcile(&mut self) -> usize {
        let mut recovered = 0;
        for pair in self.pairs.clone() {
            match self.desk.reconcile_pair(&mut self.state, &pair).await {
                Ok(true) => recovered += 1,
                Ok(false) => {}
                Err(err) => {
                    self.desk.handle_failure(&mut self.state, &pair, "start-up reconciliation", err).await;
                }
            }
        }
        info!(recovered, "Reconciliation complete");
        recovered
    }

    /// Tick until `shutdown` resolves, then report what is left open
    pub async fn run<F>(&mut self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            self.tick().await;

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping tick loop");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
        self.report_shutdown().await;
    }

    /// One sequential pass over every configured pair
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        for pair in self.pairs.clone() {
            if self.state.is_halted(&pair) {
                debug!(%pair, "Pair halted, skipping");
                report.halted += 1;
                continue;
            }
            self.process_pair(&pair, &mut report).await;
        }

        info!(
            evaluated = report.evaluated,
            skipped = report.skipped,
            opened = report.opened,
            safety_orders = report.safety_orders,
            closed = report.closed,
            failures = report.failures,
            capital = %self.state.accountant.capital(),
            realized_profit = %self.state.accountant.realized_profit(),
            "Tick complete"
        );
        report
    }

    #[instrument(skip(self, pair, report), fields(pair = %pair))]
    async fn process_pair(&mut self, pair: &Pair, report: &mut TickReport) {
        let signal = match self.desk.signals.fetch(pair).await {
            Ok(signal) => signal,
            Err(err) => {
                warn!(error = %err, "No usable signal");
                report.skipped += 1;
                let text = match err {
                    BotError::DataUnavailable(_) => format!("Skipping {} due to invalid data.", pair),
                    other => format!("Skipping {}: could not fetch market data ({}).", pair, other),
                };
                self.desk.notify(&text).await;
                return;
            }
        };
        report.evaluated += 1;
        info!(
            price = %signal.price,
            rsi = signal.rsi,
            lower_band = %signal.ema_lower_band,
            upper_band = %signal.ema_upper_band,
            "Signal"
        );

        match self.desk.evaluate_entry(&mut self.state, pair, &signal).await {
            Ok(true) => report.opened += 1,
            Ok(false) => {}
            Err(err) => {
                report.failures += 1;
                if self.desk.handle_failure(&mut self.state, pair, "entry", err).await {
                    return;
                }
            }
        }

        match self.desk.evaluate_exit(&mut self.state, pair, &signal).await {
            Ok(Some(_)) => report.closed += 1,
            Ok(None) => {}
            Err(err) => {
                report.failures += 1;
                if self.desk.handle_failure(&mut self.state, pair, "take profit check", err).await {
                    return;
                }
            }
        }

        match self.desk.evaluate_safety_order(&mut self.state, pair, &signal).await {
            Ok(true) => report.safety_orders += 1,
            Ok(false) => {}
            Err(err) => {
                report.failures += 1;
                self.desk.handle_failure(&mut self.state, pair, "safety order", err).await;
            }
        }
    }

    /// Tell the operator what is still open, in particular resting orders
    pub async fn report_shutdown(&self) {
        let mut open: Vec<_> = self.state.ledger.open_positions().collect();
        open.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut lines = Vec::new();
        for (pair, position) in open {
            let order = match &position.take_profit_order {
                Some(order) => format!(
                    "take profit order #{} for {:.8} at ${:.8} remains live on the exchange",
                    order.order_id, order.quantity, order.price
                ),
                None => "no take profit order on the exchange".to_string(),
            };
            lines.push(format!(
                "- {}: {:.8} at average ${:.8}, {} safety order(s) used, {}",
                pair,
                position.filled_quantity,
                position.average_price,
                position.safety_orders_used(),
                order
            ));
        }

        let capital = self.state.accountant.capital();
        let profit = self.state.accountant.realized_profit();
        let text = if lines.is_empty() {
            format!(
                "Shutting down with no open positions. Total capital: ${:.2}. Realized profit: ${:.2}.",
                capital, profit
            )
        } else {
            format!(
                "Shutting down with {} open position(s). Total capital: ${:.2}. Realized profit: ${:.2}.\n{}",
                lines.len(),
                capital,
                profit,
                lines.join("\n")
            )
        };
        warn!(open_positions = lines.len(), "Shutting down");
        self.desk.notify(&text).await;
    }
}

impl TradingDesk {
    async fn notify(&self, text: &str) {
        self.notifier.send(text).await;
    }

    /// Report a failed step; returns true when the pair has been halted
    async fn handle_failure(&self, state: &mut TradingState, pair: &Pair, step: &str, err: BotError) -> bool {
        if err.is_invariant_violation() {
            error!(%pair, step, error = %err, "Invariant violation, halting pair");
            state.halt(pair);
            self.notify(&format!(
                "INVARIANT VIOLATION for {} during {}: {}. Trading halted for this pair; manual intervention required.",
                pair, step, err
            ))
            .await;
            return true;
        }

        let exchange = err.is_exchange_failure();
        warn!(%pair, step, exchange, error = %err, "Step failed");
        let text = match &err {
            BotError::BelowMinimumNotional { .. } => err.to_string(),
            other if exchange => format!("Exchange call failed during {} for {}: {}", step, pair, other),
            other => format!("Error during {} for {}: {}", step, pair, other),
        };
        self.notify(&text).await;
        false
    }

    /// Fail with `BelowMinimumNotional` when `amount` is too small to trade
    async fn check_min_notional(&self, pair: &Pair, amount: Decimal) -> Result<()> {
        let minimum = self.exchange.min_notional(pair).await?;
        if amount < minimum {
            return Err(BotError::BelowMinimumNotional {
                pair: pair.to_string(),
                amount,
                minimum,
            });
        }
        Ok(())
    }

    /// Position quantity capped by what the account can actually sell
    ///
    /// `locked` is base asset held by an order about to be cancelled, which
    /// becomes free again once it is gone.
    async fn sellable_quantity(&self, pair: &Pair, position_quantity: Decimal, locked: Decimal) -> Result<Decimal> {
        let free = self.exchange.free_balance(pair.base()).await?;
        let quantity = position_quantity.min(free + locked);
        if quantity <= Decimal::ZERO {
            return Err(BotError::InvalidResponse(format!(
                "no free {} balance to sell",
                pair.base()
            )));
        }
        if quantity < position_quantity {
            debug!(%pair, %position_quantity, %quantity, "Sell quantity capped by free balance");
        }
        Ok(quantity)
    }

    async fn place_take_profit(&self, pair: &Pair, position_quantity: Decimal, price: Decimal) -> Result<OrderHandle> {
        let quantity = self.sellable_quantity(pair, position_quantity, Decimal::ZERO).await?;
        self.take_profit.place(self.exchange.as_ref(), pair, quantity, price).await
    }

    /// Step 1: open a position when FLAT and the entry rule holds
    async fn evaluate_entry(&self, state: &mut TradingState, pair: &Pair, signal: &Signal) -> Result<bool> {
        if state.ledger.is_open(pair) {
            return Ok(false);
        }
        if !self.entry.is_met(signal) {
            debug!(rsi = signal.rsi, price = %signal.price, lower_band = %signal.ema_lower_band, "Condition to BUY not met");
            return Ok(false);
        }
        info!(rsi = signal.rsi, price = %signal.price, lower_band = %signal.ema_lower_band, "Condition to BUY met");

        let amount = self.entry.entry_notional;
        self.check_min_notional(pair, amount).await?;
        let fill = self.exchange.market_buy(pair, amount).await?;
        let position = state.ledger.open_position(pair, &fill)?.clone();

        let mut text = format!(
            "Placed BUY order for ${:.2} of {} ({:.8} coins) at {:.8}.",
            fill.cost, pair, fill.filled_quantity, fill.average_price
        );

        match self.take_profit.mode() {
            TakeProfitMode::RestingLimit => {
                match self
                    .place_take_profit(pair, position.filled_quantity, position.take_profit_price)
                    .await
                {
                    Ok(order) => {
                        text.push_str(&format!(" Take profit order placed at ${:.8}.", order.price));
                        state.ledger.set_take_profit_order(pair, Some(order))?;
                    }
                    Err(err) => {
                        warn!(error = %err, "Take profit placement failed");
                        text.push_str(&format!(
                            " Failed to place take profit order: {}. Will retry next tick.",
                            err
                        ));
                    }
                }
            }
            TakeProfitMode::Virtual => {
                text.push_str(&format!(" Take profit target ${:.8}.", position.take_profit_price));
            }
        }

        self.notify(&text).await;
        Ok(true)
    }

    /// Step 2: close the position once its take-profit is hit
    async fn evaluate_exit(
        &self,
        state: &mut TradingState,
        pair: &Pair,
        signal: &Signal,
    ) -> Result<Option<ClosedPosition>> {
        let Some(position) = state.ledger.position(pair).cloned() else {
            return Ok(None);
        };

        let exit_price = match self.take_profit.mode() {
            TakeProfitMode::Virtual => {
                if !self.take_profit.is_reached(signal.price, position.take_profit_price) {
                    return Ok(None);
                }
                info!(price = %signal.price, target = %position.take_profit_price, "Take profit reached");

                let quantity = self
                    .sellable_quantity(pair, position.filled_quantity, Decimal::ZERO)
                    .await?;
                self.exchange.market_sell(pair, quantity).await?.average_price
            }
            TakeProfitMode::RestingLimit => {
                let Some(order) = position.take_profit_order.clone() else {
                    self.ensure_take_profit_order(state, pair).await?;
                    return Ok(None);
                };

                match self.exchange.query_order(&order).await? {
                    OrderStatus::Open => return Ok(None),
                    OrderStatus::Canceled => {
                        warn!(order_id = order.order_id, "Take profit order cancelled on the exchange");
                        state.ledger.set_take_profit_order(pair, None)?;
                        self.notify(&format!(
                            "Take profit order #{} for {} was cancelled on the exchange; placing a new one.",
                            order.order_id, pair
                        ))
                        .await;
                        self.ensure_take_profit_order(state, pair).await?;
                        return Ok(None);
                    }
                    OrderStatus::Filled(fill) => {
                        if position.take_profit_stale && fill.filled_quantity < position.filled_quantity {
                            self.settle_stale_fill(state, pair, &order, &fill).await?;
                            return Ok(None);
                        }
                        fill.average_price
                    }
                }
            }
        };

        let closed = state.ledger.close_position(pair, exit_price)?;
        let capital = state.accountant.record_close(closed.profit);
        info!(profit = %closed.profit, %capital, "Position closed");

        self.notify(&format!(
            "Take profit order filled for {}. Profit: ${:.2}. Total capital: ${:.2}.",
            pair, closed.profit, capital
        ))
        .await;
        Ok(Some(closed))
    }

    /// Book a fill of a stale take-profit that sold only part of the position
    ///
    /// The unsold remainder stays OPEN and gets a take-profit of its own.
    async fn settle_stale_fill(
        &self,
        state: &mut TradingState,
        pair: &Pair,
        order: &OrderHandle,
        fill: &FillResult,
    ) -> Result<()> {
        let settled = state
            .ledger
            .settle_partial_exit(pair, fill.filled_quantity, fill.average_price)?;
        let capital = state.accountant.record_profit(settled.profit);
        let remaining = state
            .ledger
            .position(pair)
            .map(|position| position.filled_quantity)
            .unwrap_or_default();
        warn!(
            order_id = order.order_id,
            sold = %settled.filled_quantity,
            %remaining,
            profit = %settled.profit,
            %capital,
            "Stale take profit filled, position stays open"
        );

        self.notify(&format!(
            "WARNING: stale take profit order #{} for {} sold {:.8} coins at ${:.8}. \
             Profit on the sold part: ${:.2}. Total capital: ${:.2}. \
             {:.8} coins remain open; placing a new take profit order for them.",
            order.order_id,
            pair,
            settled.filled_quantity,
            settled.exit_price,
            settled.profit,
            capital,
            remaining
        ))
        .await;
        self.ensure_take_profit_order(state, pair).await
    }

    /// Step 3: average down when the next rung of the ladder is hit
    async fn evaluate_safety_order(&self, state: &mut TradingState, pair: &Pair, signal: &Signal) -> Result<bool> {
        let Some(position) = state.ledger.position(pair).cloned() else {
            return Ok(false);
        };

        let used = position.safety_orders_used();
        if !self.planner.has_budget(used) {
            debug!(used, "Safety order budget exhausted");
            return Ok(false);
        }
        if !self.planner.is_triggered(signal.price, position.average_price, used) {
            return Ok(false);
        }

        let amount = self.planner.order_amount(used);
        info!(
            sequence_number = used,
            %amount,
            trigger = %self.planner.trigger_price(position.average_price, used),
            price = %signal.price,
            "Safety order triggered"
        );
        self.check_min_notional(pair, amount).await?;
        let fill = self.exchange.market_buy(pair, amount).await?;
        let updated = state
            .ledger
            .apply_safety_order(pair, SafetyOrder::new(used, fill.filled_quantity, fill.cost))?
            .clone();

        let mut text = format!(
            "Placed safety order #{} BUY for ${:.2} of {} ({:.8} coins) at {:.8}. New average price ${:.8}.",
            used + 1,
            fill.cost,
            pair,
            fill.filled_quantity,
            fill.average_price,
            updated.average_price
        );

        match self.take_profit.mode() {
            TakeProfitMode::Virtual => {
                text.push_str(&format!(
                    " Take profit moved from ${:.8} to ${:.8}.",
                    position.take_profit_price, updated.take_profit_price
                ));
            }
            TakeProfitMode::RestingLimit => match &updated.take_profit_order {
                Some(stale) => {
                    let quantity = match self
                        .sellable_quantity(pair, updated.filled_quantity, stale.quantity)
                        .await
                    {
                        Ok(quantity) => quantity,
                        Err(err) => {
                            state.ledger.mark_take_profit_stale(pair)?;
                            text.push_str(&format!(
                                " Failed to move take profit: could not size the new order ({}). \
                                 Order #{} for {:.8} coins at ${:.8} is still live; manual intervention required.",
                                err, stale.order_id, stale.quantity, stale.price
                            ));
                            self.notify(&text).await;
                            return Ok(true);
                        }
                    };
                    let outcome = self
                        .take_profit
                        .repeg(self.exchange.as_ref(), stale, quantity, updated.take_profit_price)
                        .await;
                    match outcome {
                        RepegOutcome::Moved { previous, current } => {
                            text.push_str(&format!(
                                " Take profit moved from ${:.8} to ${:.8}.",
                                previous.price, current.price
                            ));
                            state.ledger.set_take_profit_order(pair, Some(current))?;
                        }
                        RepegOutcome::CancelFailed { stale, error } => {
                            state.ledger.mark_take_profit_stale(pair)?;
                            text.push_str(&format!(
                                " Failed to move take profit: could not cancel order #{} at ${:.8} ({}). \
                                 The old target is still live and only covers {:.8} of {:.8} coins; \
                                 manual intervention required.",
                                stale.order_id, stale.price, error, stale.quantity, updated.filled_quantity
                            ));
                        }
                        RepegOutcome::PlaceFailed { previous, error } => {
                            state.ledger.set_take_profit_order(pair, None)?;
                            text.push_str(&format!(
                                " Take profit order #{} cancelled but the new one failed ({}). Will retry next tick.",
                                previous.order_id, error
                            ));
                        }
                    }
                }
                None => {
                    match self
                        .place_take_profit(pair, updated.filled_quantity, updated.take_profit_price)
                        .await
                    {
                        Ok(order) => {
                            text.push_str(&format!(" Take profit order placed at ${:.8}.", order.price));
                            state.ledger.set_take_profit_order(pair, Some(order))?;
                        }
                        Err(err) => {
                            text.push_str(&format!(
                                " Failed to place take profit order: {}. Will retry next tick.",
                                err
                            ));
                        }
                    }
                }
            },
        }

        self.notify(&text).await;
        Ok(true)
    }

    /// Place the resting take-profit for an open position that has none
    async fn ensure_take_profit_order(&self, state: &mut TradingState, pair: &Pair) -> Result<()> {
        let Some(position) = state.ledger.position(pair).cloned() else {
            return Ok(());
        };
        if position.take_profit_order.is_some() {
            return Ok(());
        }

        let order = self
            .place_take_profit(pair, position.filled_quantity, position.take_profit_price)
            .await?;
        self.notify(&format!(
            "Take profit order placed for {} at ${:.8}.",
            pair, order.price
        ))
        .await;
        state.ledger.set_take_profit_order(pair, Some(order))
    }

    /// Recover an open position from sell orders found on the exchange
    async fn reconcile_pair(&self, state: &mut TradingState, pair: &Pair) -> Result<bool> {
        if state.ledger.is_open(pair) {
            return Ok(false);
        }

        let mut sells: Vec<_> = self
            .exchange
            .open_orders(pair)
            .await?
            .into_iter()
            .filter(|order| order.side == Side::Sell)
            .collect();
        sells.sort_by_key(|order| order.order_id);
        let Some(primary) = sells.pop() else {
            debug!(%pair, "No resting sell orders, starting FLAT");
            return Ok(false);
        };

        let average_price = self.take_profit.implied_average(primary.price);
        let tracked = match self.take_profit.mode() {
            TakeProfitMode::RestingLimit => Some(primary.clone()),
            TakeProfitMode::Virtual => None,
        };
        state
            .ledger
            .seed_position(pair, average_price, primary.quantity, tracked)?;

        let mut text = format!(
            "Recovered open position for {} from take profit order #{}: {:.8} coins at average ${:.8}, target ${:.8}.",
            pair, primary.order_id, primary.quantity, average_price, primary.price
        );
        if self.take_profit.mode() == TakeProfitMode::Virtual {
            text.push_str(&format!(
                " Take profit mode is virtual, so order #{} is not managed and must be handled manually.",
                primary.order_id
            ));
        }
        if !sells.is_empty() {
            let ids: Vec<String> = sells.iter().map(|o| format!("#{}", o.order_id)).collect();
            text.push_str(&format!(
                " {} more sell order(s) are live ({}) and need manual review.",
                sells.len(),
                ids.join(", ")
            ));
        }
        info!(%pair, order_id = primary.order_id, "Recovered open position");
        self.notify(&text).await;
        Ok(true)
    }
}
