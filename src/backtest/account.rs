//! Trade account ledger

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One settled trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    /// Trading date
    pub date: NaiveDate,
    /// Portfolio value at the close (cash + marked holdings)
    pub total_value: Decimal,
    /// Cash at the close
    pub cash: Decimal,
    /// Transaction costs paid this day
    pub cost_paid: Decimal,
    /// Traded notional as a fraction of the prior portfolio value
    pub turnover: Decimal,
    /// Day return before transaction costs
    pub gross_return: f64,
    /// Benchmark return for the day
    pub bench_return: f64,
}

/// Running ledger over the full backtest horizon
///
/// One row per simulated day, strictly increasing dates. This is the output
/// artifact of the backtest engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeAccount {
    initial_value: Decimal,
    records: Vec<DailyRecord>,
}

impl TradeAccount {
    /// Create an empty ledger starting from the given account value
    pub fn new(initial_value: Decimal) -> Self {
        Self {
            initial_value,
            records: Vec::new(),
        }
    }

    /// Starting account value
    pub fn initial_value(&self) -> Decimal {
        self.initial_value
    }

    /// Settled rows in date order
    pub fn records(&self) -> &[DailyRecord] {
        &self.records
    }

    /// Number of settled days
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any day has settled
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Portfolio value after the last settled day
    pub fn final_value(&self) -> Decimal {
        self.records
            .last()
            .map(|r| r.total_value)
            .unwrap_or(self.initial_value)
    }

    pub(crate) fn append(&mut self, record: DailyRecord) {
        debug_assert!(
            self.records.last().map_or(true, |r| r.date < record.date),
            "ledger dates must be strictly increasing"
        );
        self.records.push(record);
    }

    /// Daily returns before transaction costs
    pub fn gross_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.gross_return).collect()
    }

    /// Daily returns net of transaction costs
    pub fn net_returns(&self) -> Vec<f64> {
        let mut prev = self.initial_value;
        self.records
            .iter()
            .map(|r| {
                let ret = if prev.is_zero() {
                    0.0
                } else {
                    ((r.total_value - prev) / prev).to_f64().unwrap_or(0.0)
                };
                prev = r.total_value;
                ret
            })
            .collect()
    }

    /// Daily benchmark returns
    pub fn bench_returns(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.bench_return).collect()
    }
}
