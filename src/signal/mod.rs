//! Signal module - indicators and the candle-backed signal source

pub mod indicators;
pub mod source;

pub use source::{IndicatorSettings, KlineSignalSource};
