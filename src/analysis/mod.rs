//! Return and signal statistics
//!
//! Information-coefficient series and portfolio risk metrics

mod ic;
mod risk;

pub use ic::{information_coefficient, DailySeries};
pub use risk::{
    portfolio_analysis, risk_analysis, AnalysisResult, RiskReport, TRADING_DAYS_PER_YEAR,
};

use thiserror::Error;

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The input series is empty or the inputs share no dates
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}
