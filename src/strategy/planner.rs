use rust_decimal::Decimal;

use crate::config::types::StrategyConfig;

/// One rung of the safety-order ladder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyOrderStep {
    /// Number of safety orders already used when this rung fires
    pub sequence_number: usize,
    /// Required drop below the average price, as a fraction
    pub drop_fraction: Decimal,
    /// Quote amount to buy
    pub amount: Decimal,
}

/// Safety-order planner
///
/// Pure sizing and trigger rules. Each rung needs twice the adverse move of
/// the previous one and buys `multiplier` times as much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafetyOrderPlanner {
    initial_drop: Decimal,
    first_amount: Decimal,
    multiplier: Decimal,
    max_orders: usize,
}

impl SafetyOrderPlanner {
    pub fn new(initial_drop: Decimal, first_amount: Decimal, multiplier: Decimal, max_orders: usize) -> Self {
        Self {
            initial_drop,
            first_amount,
            multiplier,
            max_orders,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(
            config.initial_safety_order_drop,
            config.first_safety_order_amount,
            config.safety_order_multiplier,
            config.safety_order_count,
        )
    }

    /// Hard ceiling on safety orders per position
    pub fn max_orders(&self) -> usize {
        self.max_orders
    }

    /// Whether another safety order may fire after `used` have
    pub fn has_budget(&self, used: usize) -> bool {
        used < self.max_orders
    }

    /// `INITIAL_DROP * 2^n`
    pub fn drop_fraction(&self, n: usize) -> Decimal {
        (0..n).fold(self.initial_drop, |drop, _| drop * Decimal::TWO)
    }

    /// `FIRST_AMOUNT * MULTIPLIER^n`
    ///
    /// Rung 0 buys the first amount and every later rung multiplies the one
    /// before it, giving 30, 60, 120, 240 with the defaults. This is not the
    /// `FIRST_AMOUNT * MULTIPLIER^(n - 1)` ladder (30, 30, 60, 120), which
    /// repeats the first amount on rung 1.
    pub fn order_amount(&self, n: usize) -> Decimal {
        (0..n).fold(self.first_amount, |amount, _| amount * self.multiplier)
    }

    /// Price at or below which rung `n` fires
    pub fn trigger_price(&self, average_price: Decimal, n: usize) -> Decimal {
        average_price * (Decimal::ONE - self.drop_fraction(n))
    }

    /// Trigger test for rung `n`; always false once the budget is spent
    pub fn is_triggered(&self, current_price: Decimal, average_price: Decimal, n: usize) -> bool {
        self.has_budget(n) && current_price <= self.trigger_price(average_price, n)
    }

    /// The whole ladder, rung by rung
    pub fn ladder(&self) -> Vec<SafetyOrderStep> {
        (0..self.max_orders)
            .map(|n| SafetyOrderStep {
                sequence_number: n,
                drop_fraction: self.drop_fraction(n),
                amount: self.order_amount(n),
            })
            .collect()
    }
}
