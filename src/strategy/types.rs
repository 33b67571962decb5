use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::types::OrderHandle;

/// How the take-profit target is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitMode {
    /// Watch the price each tick and sell at market once it crosses the target
    Virtual,
    /// Keep a limit sell resting on the exchange at the target
    #[default]
    RestingLimit,
}

impl std::fmt::Display for TakeProfitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TakeProfitMode::Virtual => write!(f, "virtual"),
            TakeProfitMode::RestingLimit => write!(f, "resting_limit"),
        }
    }
}

/// A filled averaging-down buy
///
/// Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyOrder {
    pub sequence_number: usize,
    pub filled_quantity: Decimal,
    pub cost: Decimal,
}

impl SafetyOrder {
    pub fn new(sequence_number: usize, filled_quantity: Decimal, cost: Decimal) -> Self {
        Self {
            sequence_number,
            filled_quantity,
            cost,
        }
    }
}

/// An open position for one pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Blended entry price, `cost_basis / filled_quantity`
    pub average_price: Decimal,
    pub filled_quantity: Decimal,
    pub cost_basis: Decimal,
    pub take_profit_price: Decimal,
    /// Safety orders used so far, ordered by sequence number
    pub safety_orders: Vec<SafetyOrder>,
    /// Resting take-profit order, if one is live on the exchange
    pub take_profit_order: Option<OrderHandle>,
    /// The tracked order could not be moved after a safety order and only
    /// covers the quantity held before it
    pub take_profit_stale: bool,
}

impl Position {
    /// Number of safety orders already used
    pub fn safety_orders_used(&self) -> usize {
        self.safety_orders.len()
    }

    /// `cost_basis == average_price * filled_quantity` within `tolerance`
    pub fn is_consistent(&self, tolerance: Decimal) -> bool {
        (self.average_price * self.filled_quantity - self.cost_basis).abs() <= tolerance
    }
}

/// Per-pair state in the trading state machine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PairState {
    #[default]
    Flat,
    Open(Position),
}

impl PairState {
    pub fn is_open(&self) -> bool {
        matches!(self, PairState::Open(_))
    }

    pub fn position(&self) -> Option<&Position> {
        match self {
            PairState::Open(position) => Some(position),
            PairState::Flat => None,
        }
    }
}

/// Outcome of closing a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedPosition {
    pub exit_price: Decimal,
    pub average_price: Decimal,
    pub filled_quantity: Decimal,
    pub safety_orders_used: usize,
    /// `(exit_price - average_price) * filled_quantity`
    pub profit: Decimal,
}
