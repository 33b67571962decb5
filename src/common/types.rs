//! Unified types shared by the core and its collaborators

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::{BotError, Result};

/// A tradable market, written `BASE/QUOTE` (e.g. `PEPE/USDT`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    base: String,
    quote: String,
}

impl Pair {
    /// Parse a `BASE/QUOTE` identifier
    pub fn parse(value: &str) -> Result<Self> {
        let (base, quote) = value
            .trim()
            .split_once('/')
            .ok_or_else(|| BotError::Configuration(format!("Invalid pair '{}', expected BASE/QUOTE", value)))?;

        let base = base.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        if base.is_empty() || quote.is_empty() {
            return Err(BotError::Configuration(format!(
                "Invalid pair '{}', expected BASE/QUOTE",
                value
            )));
        }

        Ok(Self { base, quote })
    }

    /// Base asset (what is bought and sold)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Quote asset (what notionals are expressed in)
    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Exchange symbol with the separator removed (`PEPEUSDT`)
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl std::fmt::Display for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl TryFrom<String> for Pair {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self> {
        Pair::parse(&value)
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.to_string()
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Market signal for one pair at one tick
///
/// Consumed once by the controller and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub rsi: f64,
    pub ema: Decimal,
    pub ema_lower_band: Decimal,
    pub ema_upper_band: Decimal,
    /// Last traded price
    pub price: Decimal,
}

/// Normalized result of an executed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillResult {
    /// Volume-weighted execution price
    pub average_price: Decimal,
    /// Base quantity filled
    pub filled_quantity: Decimal,
    /// Quote amount spent or received
    pub cost: Decimal,
}

impl FillResult {
    /// Build a fill from executed quantity and quote cost
    pub fn from_totals(filled_quantity: Decimal, cost: Decimal) -> Result<Self> {
        if filled_quantity <= Decimal::ZERO {
            return Err(BotError::InvalidResponse(format!(
                "Order reported a non-positive filled quantity: {}",
                filled_quantity
            )));
        }

        Ok(Self {
            average_price: cost / filled_quantity,
            filled_quantity,
            cost,
        })
    }
}

/// Reference to an order resting on the exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderHandle {
    pub pair: Pair,
    pub order_id: u64,
    pub side: Side,
    /// Limit price
    pub price: Decimal,
    /// Remaining (unfilled) quantity
    pub quantity: Decimal,
}

/// Lifecycle state of a resting order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    /// Still live (possibly partially filled)
    Open,
    /// Completely filled
    Filled(FillResult),
    /// Cancelled, rejected or expired
    Canceled,
}

/// Trading rules the exchange enforces for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRules {
    pub min_notional: Decimal,
    /// Quantity increment (zero when unrestricted)
    pub step_size: Decimal,
    /// Price increment (zero when unrestricted)
    pub tick_size: Decimal,
}

impl SymbolRules {
    /// Round a quantity down to the lot step
    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        round_down_to(quantity, self.step_size)
    }

    /// Round a price down to the tick size
    pub fn round_price(&self, price: Decimal) -> Decimal {
        round_down_to(price, self.tick_size)
    }
}

fn round_down_to(value: Decimal, increment: Decimal) -> Decimal {
    if increment <= Decimal::ZERO {
        return value.normalize();
    }
    ((value / increment).floor() * increment).normalize()
}
