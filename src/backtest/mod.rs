//! Backtesting module
//!
//! Replays a predicted signal through a daily order-execution simulation with
//! transaction costs, price-limit handling, and exact decimal accounting

mod account;
mod engine;
mod exchange;
mod position;
mod strategy;
mod types;

pub use account::{DailyRecord, TradeAccount};
pub use engine::BacktestEngine;
pub use exchange::{Exchange, Quote};
pub use position::{Holding, Position};
pub use strategy::{Strategy, TopkDropoutStrategy};
pub use types::{BacktestError, Direction, Order};
