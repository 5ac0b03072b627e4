//! Portfolio risk metrics

use super::AnalysisError;
use crate::backtest::TradeAccount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Annualization factor for daily series
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Statistics of one daily return series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskReport {
    /// Mean daily return
    pub mean: f64,
    /// Sample standard deviation of daily returns
    pub std: f64,
    /// Mean scaled to a year
    pub annualized_return: f64,
    /// Standard deviation scaled to a year
    pub annualized_volatility: f64,
    /// Annualized return over annualized volatility; NaN at zero volatility
    pub information_ratio: f64,
    /// Worst peak-to-trough decline of cumulative value, in [-1, 0]
    pub max_drawdown: f64,
}

/// Compute return/risk statistics for a daily return series
///
/// Deterministic and stateless; an empty series is an error.
pub fn risk_analysis(returns: &[f64], periods_per_year: usize) -> Result<RiskReport, AnalysisError> {
    if returns.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "return series is empty".to_string(),
        ));
    }
    let n = returns.len() as f64;
    let periods = periods_per_year as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let std = if returns.len() < 2 {
        0.0
    } else {
        let ss = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>();
        (ss / (n - 1.0)).sqrt()
    };

    let annualized_return = mean * periods;
    let annualized_volatility = std * periods.sqrt();
    let information_ratio = if annualized_volatility == 0.0 {
        f64::NAN
    } else {
        annualized_return / annualized_volatility
    };

    let mut peak = 1.0f64;
    let mut cumulative = 1.0f64;
    let mut max_drawdown = 0.0f64;
    for r in returns {
        cumulative *= 1.0 + r;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.min(cumulative / peak - 1.0);
    }

    Ok(RiskReport {
        mean,
        std,
        annualized_return,
        annualized_volatility,
        information_ratio,
        max_drawdown,
    })
}

/// Risk metrics keyed by (category, metric)
///
/// Categories compare the strategy to its benchmark before and after
/// transaction costs. Non-finite values survive serialization (encoded as
/// null), so a NaN information ratio round-trips through the artifact store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "AnalysisResultRepr", from = "AnalysisResultRepr")]
pub struct AnalysisResult {
    categories: BTreeMap<String, BTreeMap<String, f64>>,
}

impl AnalysisResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one metric
    pub fn insert(&mut self, category: &str, metric: &str, value: f64) {
        self.categories
            .entry(category.to_string())
            .or_default()
            .insert(metric.to_string(), value);
    }

    /// Set all metrics of a report under one category
    pub fn insert_report(&mut self, category: &str, report: &RiskReport) {
        self.insert(category, "mean", report.mean);
        self.insert(category, "std", report.std);
        self.insert(category, "annualized_return", report.annualized_return);
        self.insert(category, "annualized_volatility", report.annualized_volatility);
        self.insert(category, "information_ratio", report.information_ratio);
        self.insert(category, "max_drawdown", report.max_drawdown);
    }

    /// Look up one metric
    pub fn get(&self, category: &str, metric: &str) -> Option<f64> {
        self.categories.get(category)?.get(metric).copied()
    }

    /// Category names
    pub fn categories(&self) -> Vec<&str> {
        self.categories.keys().map(String::as_str).collect()
    }
}

/// JSON shape for [`AnalysisResult`]: non-finite floats become null
#[derive(Serialize, Deserialize)]
struct AnalysisResultRepr(BTreeMap<String, BTreeMap<String, Option<f64>>>);

impl From<AnalysisResult> for AnalysisResultRepr {
    fn from(result: AnalysisResult) -> Self {
        Self(
            result
                .categories
                .into_iter()
                .map(|(category, metrics)| {
                    let metrics = metrics
                        .into_iter()
                        .map(|(name, value)| (name, value.is_finite().then_some(value)))
                        .collect();
                    (category, metrics)
                })
                .collect(),
        )
    }
}

impl From<AnalysisResultRepr> for AnalysisResult {
    fn from(repr: AnalysisResultRepr) -> Self {
        Self {
            categories: repr
                .0
                .into_iter()
                .map(|(category, metrics)| {
                    let metrics = metrics
                        .into_iter()
                        .map(|(name, value)| (name, value.unwrap_or(f64::NAN)))
                        .collect();
                    (category, metrics)
                })
                .collect(),
        }
    }
}

/// Analyze a completed backtest against its benchmark
///
/// Produces the three standard categories: the benchmark itself, the excess
/// return before costs, and the excess return after costs.
pub fn portfolio_analysis(
    account: &TradeAccount,
    periods_per_year: usize,
) -> Result<AnalysisResult, AnalysisError> {
    let gross = account.gross_returns();
    let net = account.net_returns();
    let bench = account.bench_returns();

    let excess: Vec<f64> = gross.iter().zip(&bench).map(|(r, b)| r - b).collect();
    let excess_with_cost: Vec<f64> = net.iter().zip(&bench).map(|(r, b)| r - b).collect();

    let mut result = AnalysisResult::new();
    result.insert_report("benchmark", &risk_analysis(&bench, periods_per_year)?);
    result.insert_report("excess_return", &risk_analysis(&excess, periods_per_year)?);
    result.insert_report(
        "excess_return_with_cost",
        &risk_analysis(&excess_with_cost, periods_per_year)?,
    );
    Ok(result)
}
