//! Simulated exchange: daily quotes, tradability, deal prices

use crate::config::DealPrice;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One instrument's quote for a single trading day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Opening price
    pub open: Decimal,
    /// Closing price
    pub close: Decimal,
    /// Day-over-day price move as a fraction of the prior close
    pub change: f64,
}

/// Daily quote table for the simulated market
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    quotes: BTreeMap<NaiveDate, BTreeMap<String, Quote>>,
}

impl Exchange {
    /// Create an empty exchange
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an exchange from (date, instrument, quote) triples
    ///
    /// A later triple for the same (date, instrument) overwrites the earlier.
    pub fn from_quotes<I>(quotes: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, String, Quote)>,
    {
        let mut exchange = Self::new();
        for (date, instrument, quote) in quotes {
            exchange.insert(date, instrument, quote);
        }
        exchange
    }

    /// Insert a quote
    pub fn insert(&mut self, date: NaiveDate, instrument: String, quote: Quote) {
        self.quotes.entry(date).or_default().insert(instrument, quote);
    }

    /// The quote for an instrument on a date, if it traded
    pub fn quote(&self, date: NaiveDate, instrument: &str) -> Option<&Quote> {
        self.quotes.get(&date).and_then(|day| day.get(instrument))
    }

    /// The fill price for an instrument on a date under the deal-price policy
    pub fn deal_price(&self, date: NaiveDate, instrument: &str, deal: DealPrice) -> Option<Decimal> {
        self.quote(date, instrument).map(|q| match deal {
            DealPrice::Open => q.open,
            DealPrice::Close => q.close,
        })
    }

    /// Whether an instrument can be traded on a date
    ///
    /// An instrument with no quote, a non-positive price, or a price move at or
    /// beyond the limit threshold is untradeable for the whole day.
    pub fn tradeable(&self, date: NaiveDate, instrument: &str, limit_threshold: f64) -> bool {
        match self.quote(date, instrument) {
            Some(q) => {
                q.open > Decimal::ZERO
                    && q.close > Decimal::ZERO
                    && (limit_threshold == 0.0 || q.change.abs() < limit_threshold)
            }
            None => false,
        }
    }
}
