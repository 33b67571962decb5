use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::common::errors::{BotError, Result};
use crate::common::types::{FillResult, OrderHandle, Pair};
use crate::strategy::take_profit::TakeProfitManager;
use crate::strategy::types::{ClosedPosition, PairState, Position, SafetyOrder};

/// Position ledger
///
/// Owns the [`PairState`] of every configured pair. Pairs are independent:
/// no operation touches more than the pair it is given.
#[derive(Debug, Clone)]
pub struct PositionLedger {
    states: HashMap<Pair, PairState>,
    take_profit: TakeProfitManager,
}

impl PositionLedger {
    pub fn new(pairs: &[Pair], take_profit: TakeProfitManager) -> Self {
        Self {
            states: pairs.iter().map(|p| (p.clone(), PairState::Flat)).collect(),
            take_profit,
        }
    }

    pub fn state(&self, pair: &Pair) -> Option<&PairState> {
        self.states.get(pair)
    }

    pub fn is_open(&self, pair: &Pair) -> bool {
        self.states.get(pair).map(PairState::is_open).unwrap_or(false)
    }

    pub fn position(&self, pair: &Pair) -> Option<&Position> {
        self.states.get(pair).and_then(PairState::position)
    }

    /// All open positions
    pub fn open_positions(&self) -> impl Iterator<Item = (&Pair, &Position)> {
        self.states
            .iter()
            .filter_map(|(pair, state)| state.position().map(|position| (pair, position)))
    }

    /// Open a position from the initial buy fill
    pub fn open_position(&mut self, pair: &Pair, fill: &FillResult) -> Result<&Position> {
        if fill.filled_quantity <= Decimal::ZERO || fill.cost <= Decimal::ZERO {
            return Err(BotError::InvariantViolation(format!(
                "cannot open {} from an empty fill ({} for ${})",
                pair, fill.filled_quantity, fill.cost
            )));
        }

        let average_price = fill.cost / fill.filled_quantity;
        let position = Position {
            average_price,
            filled_quantity: fill.filled_quantity,
            cost_basis: fill.cost,
            take_profit_price: self.take_profit.compute_target(average_price),
            safety_orders: Vec::new(),
            take_profit_order: None,
            take_profit_stale: false,
        };
        self.insert_open(pair, position)
    }

    /// Seed an open position recovered from the exchange at start-up
    pub fn seed_position(
        &mut self,
        pair: &Pair,
        average_price: Decimal,
        filled_quantity: Decimal,
        take_profit_order: Option<OrderHandle>,
    ) -> Result<&Position> {
        if average_price <= Decimal::ZERO || filled_quantity <= Decimal::ZERO {
            return Err(BotError::InvariantViolation(format!(
                "cannot seed {} with price {} and quantity {}",
                pair, average_price, filled_quantity
            )));
        }

        let position = Position {
            average_price,
            filled_quantity,
            cost_basis: average_price * filled_quantity,
            take_profit_price: self.take_profit.compute_target(average_price),
            safety_orders: Vec::new(),
            take_profit_order,
            take_profit_stale: false,
        };
        self.insert_open(pair, position)
    }

    /// Record a filled safety order and re-blend the position
    ///
    /// Average price, quantity, cost basis and take-profit target are
    /// computed first and written together, so a rejected order leaves the
    /// position untouched.
    pub fn apply_safety_order(&mut self, pair: &Pair, order: SafetyOrder) -> Result<&Position> {
        let take_profit = self.take_profit;
        let position = self.open_mut(pair, "apply a safety order")?;

        let total_quantity = position.filled_quantity + order.filled_quantity;
        if total_quantity <= Decimal::ZERO {
            return Err(BotError::InvariantViolation(format!(
                "safety order #{} would leave {} with quantity {}",
                order.sequence_number, pair, total_quantity
            )));
        }
        let total_cost = position.cost_basis + order.cost;
        let new_average = total_cost / total_quantity;

        position.filled_quantity = total_quantity;
        position.cost_basis = total_cost;
        position.average_price = new_average;
        position.take_profit_price = take_profit.compute_target(new_average);
        position.safety_orders.push(order);

        Ok(position)
    }

    /// Track (or clear) the resting take-profit order of an open position
    pub fn set_take_profit_order(&mut self, pair: &Pair, order: Option<OrderHandle>) -> Result<()> {
        let position = self.open_mut(pair, "set a take profit order")?;
        position.take_profit_order = order;
        position.take_profit_stale = false;
        Ok(())
    }

    /// Flag the tracked take-profit order as covering less than the position
    pub fn mark_take_profit_stale(&mut self, pair: &Pair) -> Result<()> {
        self.open_mut(pair, "mark a take profit order stale")?.take_profit_stale = true;
        Ok(())
    }

    /// Book the sale of part of a position and keep the rest OPEN
    ///
    /// The average price and take-profit target are unchanged; quantity and
    /// cost basis shrink by `sold_quantity` and the take-profit order is
    /// cleared so a new one can be placed for the remainder.
    pub fn settle_partial_exit(
        &mut self,
        pair: &Pair,
        sold_quantity: Decimal,
        exit_price: Decimal,
    ) -> Result<ClosedPosition> {
        let position = self.open_mut(pair, "settle a partial exit")?;
        if sold_quantity <= Decimal::ZERO || sold_quantity >= position.filled_quantity {
            return Err(BotError::InvariantViolation(format!(
                "partial exit of {} from {} holding {}",
                sold_quantity, pair, position.filled_quantity
            )));
        }

        let remaining = position.filled_quantity - sold_quantity;
        position.filled_quantity = remaining;
        position.cost_basis = position.average_price * remaining;
        position.take_profit_order = None;
        position.take_profit_stale = false;

        Ok(ClosedPosition {
            exit_price,
            average_price: position.average_price,
            filled_quantity: sold_quantity,
            safety_orders_used: position.safety_orders.len(),
            profit: (exit_price - position.average_price) * sold_quantity,
        })
    }

    /// Close the position at `exit_price`, returning it to FLAT
    pub fn close_position(&mut self, pair: &Pair, exit_price: Decimal) -> Result<ClosedPosition> {
        // Taking a Flat state leaves it Flat.
        let position = match self.states.get_mut(pair).map(std::mem::take) {
            Some(PairState::Open(position)) => position,
            _ => {
                return Err(BotError::InvariantViolation(format!(
                    "cannot close {}: no open position",
                    pair
                )))
            }
        };

        Ok(ClosedPosition {
            exit_price,
            average_price: position.average_price,
            filled_quantity: position.filled_quantity,
            safety_orders_used: position.safety_orders.len(),
            profit: (exit_price - position.average_price) * position.filled_quantity,
        })
    }

    fn insert_open(&mut self, pair: &Pair, position: Position) -> Result<&Position> {
        let state = self
            .states
            .get_mut(pair)
            .ok_or_else(|| BotError::InvariantViolation(format!("{} is not a configured pair", pair)))?;

        if state.is_open() {
            return Err(BotError::InvariantViolation(format!(
                "a position is already open for {}",
                pair
            )));
        }

        *state = PairState::Open(position);
        match state {
            PairState::Open(position) => Ok(position),
            PairState::Flat => unreachable!("state was just opened"),
        }
    }

    fn open_mut(&mut self, pair: &Pair, action: &str) -> Result<&mut Position> {
        match self.states.get_mut(pair) {
            Some(PairState::Open(position)) => Ok(position),
            _ => Err(BotError::InvariantViolation(format!(
                "cannot {} for {}: no open position",
                action, pair
            ))),
        }
    }
}
