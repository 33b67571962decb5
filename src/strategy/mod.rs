//! Strategy module: the position / safety-order state machine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 TICK LOOP (single task)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  for each pair:                                             │
//! │    SignalSource.fetch()                                     │
//! │         │                                                   │
//! │         ▼                                                   │
//! │    1. FLAT + entry rule      → market buy → Ledger.open      │
//! │    2. OPEN + target reached  → close → Ledger.close         │
//! │                                       → Accountant          │
//! │    3. OPEN + ladder trigger  → market buy → Ledger.apply    │
//! │                                       → TakeProfit.repeg    │
//! │         │                                                   │
//! │         ▼                                                   │
//! │    Notifier.send()                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TradingController`]: per-pair FLAT/OPEN state machine and tick loop
//! - [`PositionLedger`]: open positions and their safety orders
//! - [`SafetyOrderPlanner`]: ladder trigger prices and order sizes
//! - [`TakeProfitManager`]: target price and resting-order re-pegging
//! - [`CapitalAccountant`]: running capital across closes
//!
//! All mutable state lives in [`TradingState`], owned by the controller and
//! handed by reference to each step. Nothing here is shared across tasks.

mod accountant;
mod controller;
mod ledger;
mod planner;
mod take_profit;
mod types;

pub use accountant::CapitalAccountant;

pub use controller::{EntryRule, TickReport, TradingController, TradingState};

pub use ledger::PositionLedger;

pub use planner::{SafetyOrderPlanner, SafetyOrderStep};

pub use take_profit::{RepegOutcome, TakeProfitManager};

pub use types::{ClosedPosition, PairState, Position, SafetyOrder, TakeProfitMode};
