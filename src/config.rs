//! Configuration types for alpha-lab

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// topk must be at least one
    #[error("topk must be positive")]
    ZeroTopk,
    /// n_drop cannot exceed topk
    #[error("n_drop {n_drop} exceeds topk {topk}")]
    DropExceedsTopk { n_drop: usize, topk: usize },
    /// A cost rate is outside [0, 1]
    #[error("{name} must lie in [0, 1], got {value}")]
    CostOutOfRange { name: &'static str, value: Decimal },
    /// min_cost cannot be negative
    #[error("min_cost must be non-negative, got {0}")]
    NegativeMinCost(Decimal),
    /// limit_threshold cannot be negative
    #[error("limit_threshold must be non-negative, got {0}")]
    NegativeLimit(f64),
    /// The starting account value must be positive
    #[error("account must be positive, got {0}")]
    NonPositiveAccount(Decimal),
}

/// Root configuration for a portfolio analysis run
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PortfolioConfig {
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

/// Strategy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Number of instruments to hold
    #[serde(default = "default_topk")]
    pub topk: usize,

    /// Maximum names swapped out per day
    #[serde(default = "default_n_drop")]
    pub n_drop: usize,

    /// How buy orders are sized across the holdings
    #[serde(default)]
    pub sizing: PositionSizing,
}

/// Position sizing policy across the top-k holdings
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizing {
    /// Each holding targets an equal share of portfolio value
    #[default]
    EqualWeight,
}

fn default_topk() -> usize {
    50
}
fn default_n_drop() -> usize {
    5
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            topk: 50,
            n_drop: 5,
            sizing: PositionSizing::EqualWeight,
        }
    }
}

/// Which daily price orders are filled at
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DealPrice {
    /// Fill at the day's open
    Open,
    /// Fill at the day's close
    #[default]
    Close,
}

/// Backtest execution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Starting account value
    #[serde(default = "default_account")]
    pub account: Decimal,

    /// Benchmark instrument identifier
    #[serde(default)]
    pub benchmark: String,

    /// Price orders are filled at
    #[serde(default)]
    pub deal_price: DealPrice,

    /// Cost rate on buy notional
    #[serde(default = "default_open_cost")]
    pub open_cost: Decimal,

    /// Cost rate on sell notional
    #[serde(default = "default_close_cost")]
    pub close_cost: Decimal,

    /// Per-order cost floor
    #[serde(default = "default_min_cost")]
    pub min_cost: Decimal,

    /// Daily price-move fraction at which an instrument becomes untradeable
    #[serde(default = "default_limit_threshold")]
    pub limit_threshold: f64,

    /// Log each simulated day at info level
    #[serde(default)]
    pub verbose: bool,
}

fn default_account() -> Decimal {
    Decimal::new(100_000_000, 0)
}
fn default_open_cost() -> Decimal {
    Decimal::new(5, 4) // 0.0005
}
fn default_close_cost() -> Decimal {
    Decimal::new(15, 4) // 0.0015
}
fn default_min_cost() -> Decimal {
    Decimal::new(5, 0)
}
fn default_limit_threshold() -> f64 {
    0.095
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            account: default_account(),
            benchmark: String::new(),
            deal_price: DealPrice::Close,
            open_cost: default_open_cost(),
            close_cost: default_close_cost(),
            min_cost: default_min_cost(),
            limit_threshold: default_limit_threshold(),
            verbose: false,
        }
    }
}

impl StrategyConfig {
    /// Check strategy parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.topk == 0 {
            return Err(ConfigError::ZeroTopk);
        }
        if self.n_drop > self.topk {
            return Err(ConfigError::DropExceedsTopk {
                n_drop: self.n_drop,
                topk: self.topk,
            });
        }
        Ok(())
    }
}

impl BacktestConfig {
    /// Check backtest parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.account <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveAccount(self.account));
        }
        for (name, value) in [("open_cost", self.open_cost), ("close_cost", self.close_cost)] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(ConfigError::CostOutOfRange { name, value });
            }
        }
        if self.min_cost < Decimal::ZERO {
            return Err(ConfigError::NegativeMinCost(self.min_cost));
        }
        if self.limit_threshold < 0.0 {
            return Err(ConfigError::NegativeLimit(self.limit_threshold));
        }
        Ok(())
    }
}

impl PortfolioConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PortfolioConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.backtest.validate()
    }
}
