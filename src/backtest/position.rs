//! Position tracking

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shares held in one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Shares held
    pub shares: Decimal,
    /// Cumulative notional paid for the held shares, excluding fees
    pub cost_basis: Decimal,
}

impl Holding {
    /// Average price paid per held share
    pub fn avg_price(&self) -> Decimal {
        if self.shares.is_zero() {
            Decimal::ZERO
        } else {
            self.cost_basis / self.shares
        }
    }
}

/// Cash plus holdings for one simulation run
///
/// Exactly one live Position exists per backtest, mutated day by day and
/// discarded when the replay ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    cash: Decimal,
    holdings: BTreeMap<String, Holding>,
}

impl Position {
    /// Create an all-cash position
    pub fn new(cash: Decimal) -> Self {
        Self {
            cash,
            holdings: BTreeMap::new(),
        }
    }

    /// Available cash
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Number of instruments held
    pub fn count(&self) -> usize {
        self.holdings.len()
    }

    /// Whether the instrument is currently held
    pub fn holds(&self, instrument: &str) -> bool {
        self.holdings.contains_key(instrument)
    }

    /// Shares held in an instrument (zero if not held)
    pub fn shares(&self, instrument: &str) -> Decimal {
        self.holdings
            .get(instrument)
            .map(|h| h.shares)
            .unwrap_or(Decimal::ZERO)
    }

    /// Held instruments in lexical order
    pub fn instruments(&self) -> Vec<&str> {
        self.holdings.keys().map(String::as_str).collect()
    }

    /// The holding for an instrument
    pub fn holding(&self, instrument: &str) -> Option<&Holding> {
        self.holdings.get(instrument)
    }

    /// Execute a buy: debit notional plus cost, add shares
    pub fn buy(&mut self, instrument: &str, shares: Decimal, price: Decimal, cost: Decimal) {
        let notional = shares * price;
        self.cash -= notional + cost;
        let holding = self
            .holdings
            .entry(instrument.to_string())
            .or_insert(Holding {
                shares: Decimal::ZERO,
                cost_basis: Decimal::ZERO,
            });
        holding.shares += shares;
        holding.cost_basis += notional;
    }

    /// Execute a sell: credit proceeds minus cost, remove shares
    ///
    /// Sells at most the held amount; the holding disappears when its share
    /// count reaches zero. Returns the shares actually sold.
    pub fn sell(&mut self, instrument: &str, shares: Decimal, price: Decimal, cost: Decimal) -> Decimal {
        let Some(holding) = self.holdings.get_mut(instrument) else {
            return Decimal::ZERO;
        };
        let sold = shares.min(holding.shares);
        if sold <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let basis_released = holding.cost_basis * (sold / holding.shares);
        holding.shares -= sold;
        holding.cost_basis -= basis_released;
        if holding.shares.is_zero() {
            self.holdings.remove(instrument);
        }
        self.cash += sold * price - cost;
        sold
    }

    /// Mark-to-market value of the holdings at the given prices
    ///
    /// An instrument absent from the marks falls back to its average paid
    /// price, so a never-quoted holding is carried at cost.
    pub fn holdings_value(&self, marks: &BTreeMap<String, Decimal>) -> Decimal {
        self.holdings
            .iter()
            .map(|(instrument, holding)| {
                let price = marks
                    .get(instrument)
                    .copied()
                    .unwrap_or_else(|| holding.avg_price());
                holding.shares * price
            })
            .sum()
    }

    /// Cash plus mark-to-market holdings value
    pub fn total_value(&self, marks: &BTreeMap<String, Decimal>) -> Decimal {
        self.cash + self.holdings_value(marks)
    }
}
