use rust_decimal::Decimal;

/// Capital accountant
///
/// A running total of realized profit. It is reported, never enforced
/// against order sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapitalAccountant {
    initial_capital: Decimal,
    capital: Decimal,
    closed_positions: u64,
}

impl CapitalAccountant {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            capital: initial_capital,
            closed_positions: 0,
        }
    }

    /// Add a close's profit (or loss) and return the new capital
    pub fn record_close(&mut self, profit: Decimal) -> Decimal {
        self.closed_positions += 1;
        self.record_profit(profit)
    }

    /// Add profit from a sale that left the position open
    pub fn record_profit(&mut self, profit: Decimal) -> Decimal {
        self.capital += profit;
        self.capital
    }

    pub fn capital(&self) -> Decimal {
        self.capital
    }

    /// Profit realized since start-up
    pub fn realized_profit(&self) -> Decimal {
        self.capital - self.initial_capital
    }

    pub fn closed_positions(&self) -> u64 {
        self.closed_positions
    }
}
