use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::common::errors::{BotError, Result};
use crate::common::traits::ExchangeGateway;
use crate::common::types::{OrderHandle, Pair};
use crate::strategy::types::TakeProfitMode;

/// Result of moving a resting take-profit order to a new target
#[derive(Debug)]
pub enum RepegOutcome {
    /// Stale order cancelled and a new one placed
    Moved {
        previous: OrderHandle,
        current: OrderHandle,
    },
    /// Stale order could not be cancelled and is assumed to still be live
    CancelFailed { stale: OrderHandle, error: BotError },
    /// Stale order cancelled but the replacement was rejected; nothing rests now
    PlaceFailed { previous: OrderHandle, error: BotError },
}

/// Take-profit manager
///
/// Computes the target from the average entry price and, in
/// [`TakeProfitMode::RestingLimit`], keeps a limit sell on the exchange in
/// step with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TakeProfitManager {
    profit_target: Decimal,
    mode: TakeProfitMode,
}

impl TakeProfitManager {
    pub fn new(profit_target: Decimal, mode: TakeProfitMode) -> Self {
        Self { profit_target, mode }
    }

    pub fn mode(&self) -> TakeProfitMode {
        self.mode
    }

    pub fn profit_target(&self) -> Decimal {
        self.profit_target
    }

    /// `average_price * (1 + PROFIT_TARGET)`
    pub fn compute_target(&self, average_price: Decimal) -> Decimal {
        average_price * (Decimal::ONE + self.profit_target)
    }

    /// Inverse of [`compute_target`](Self::compute_target), used to recover
    /// an average price from a resting order found at start-up
    pub fn implied_average(&self, target_price: Decimal) -> Decimal {
        target_price / (Decimal::ONE + self.profit_target)
    }

    /// Virtual-mode exit test
    pub fn is_reached(&self, current_price: Decimal, target_price: Decimal) -> bool {
        current_price >= target_price
    }

    /// Rest a new take-profit limit sell
    #[instrument(skip(self, exchange))]
    pub async fn place(
        &self,
        exchange: &dyn ExchangeGateway,
        pair: &Pair,
        quantity: Decimal,
        target_price: Decimal,
    ) -> Result<OrderHandle> {
        let handle = exchange.place_limit_sell(pair, quantity, target_price).await?;
        info!(order_id = handle.order_id, price = %handle.price, "Take profit order placed");
        Ok(handle)
    }

    /// Replace `stale` with a limit sell of `quantity` at `target_price`
    ///
    /// The stale order is always cancelled first. If that fails nothing new
    /// is placed, so the book never carries two take-profit orders.
    #[instrument(skip(self, exchange, stale), fields(stale_order_id = stale.order_id))]
    pub async fn repeg(
        &self,
        exchange: &dyn ExchangeGateway,
        stale: &OrderHandle,
        quantity: Decimal,
        target_price: Decimal,
    ) -> RepegOutcome {
        if let Err(error) = exchange.cancel(stale).await {
            warn!(%error, "Could not cancel stale take profit order, leaving it in place");
            return RepegOutcome::CancelFailed {
                stale: stale.clone(),
                error,
            };
        }

        match self.place(exchange, &stale.pair, quantity, target_price).await {
            Ok(current) => RepegOutcome::Moved {
                previous: stale.clone(),
                current,
            },
            Err(error) => {
                warn!(%error, "Stale take profit cancelled but replacement failed");
                RepegOutcome::PlaceFailed {
                    previous: stale.clone(),
                    error,
                }
            }
        }
    }
}
