//! Backtest types

use crate::config::ConfigError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Backtest errors
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Configuration rejected before the replay starts
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The signal or quote data cannot support a replay
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

/// A single day's trading instruction
///
/// Generated fresh each trading day and consumed immediately by the execution
/// step; never persisted.
#[derive(Debug, Clone)]
pub struct Order {
    /// Instrument identifier
    pub instrument: String,
    /// Trade direction
    pub direction: Direction,
    /// Target shares to trade
    pub shares: Decimal,
    /// Day the decision was made
    pub date: NaiveDate,
}
