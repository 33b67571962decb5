//! DCA Safety Bot Library
//!
//! Spot DCA trading with a safety-order ladder: enter on oversold signals,
//! average down on a geometric ladder of drops, and exit at a fixed profit
//! above the average entry price.

pub mod binance;
pub mod common;
pub mod config;
pub mod health;
pub mod notify;
pub mod signal;
pub mod strategy;

// Re-export commonly used types
pub use binance::{BinanceClient, BinanceRestClient};
pub use common::errors::{BotError, Result};
pub use common::traits::{ExchangeGateway, Notifier, SignalSource};
pub use common::types::{FillResult, OrderHandle, OrderStatus, Pair, Side, Signal, SymbolRules};
pub use config::types::AppConfig;
pub use notify::{LogNotifier, TelegramNotifier};
pub use signal::{IndicatorSettings, KlineSignalSource};

// Strategy types
pub use strategy::{
    CapitalAccountant, ClosedPosition, EntryRule, PairState, Position, PositionLedger, RepegOutcome,
    SafetyOrder, SafetyOrderPlanner, SafetyOrderStep, TakeProfitManager, TakeProfitMode, TickReport,
    TradingController, TradingState,
};
