//! Portfolio strategies

use super::exchange::Exchange;
use super::position::Position;
use super::types::{Direction, Order};
use crate::config::{ConfigError, DealPrice, PositionSizing, StrategyConfig};
use crate::data::SignalRow;
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Turns a day's signal slice into orders
pub trait Strategy {
    /// Decide today's orders
    ///
    /// `total_value` is the portfolio value marked at today's prices, used for
    /// position sizing. Sell orders precede buy orders in the returned list.
    fn orders(
        &self,
        date: NaiveDate,
        position: &Position,
        today: &[SignalRow],
        exchange: &Exchange,
        deal: DealPrice,
        total_value: Decimal,
    ) -> Vec<Order>;
}

/// Hold the top-k scored instruments, swapping at most `n_drop` names per day
///
/// Instruments are ranked by score descending with ties broken by instrument
/// id, so a replay is fully deterministic. Held instruments missing from
/// today's signal rank below every scored one. When the portfolio is under k
/// names it fills back up before swapping.
#[derive(Debug, Clone)]
pub struct TopkDropoutStrategy {
    topk: usize,
    n_drop: usize,
    sizing: PositionSizing,
}

impl TopkDropoutStrategy {
    /// Create a strategy from validated configuration
    pub fn new(config: &StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            topk: config.topk,
            n_drop: config.n_drop,
            sizing: config.sizing,
        })
    }

    fn buy_notional(&self, total_value: Decimal) -> Decimal {
        match self.sizing {
            PositionSizing::EqualWeight => {
                total_value / Decimal::from(self.topk as u64)
            }
        }
    }
}

impl Strategy for TopkDropoutStrategy {
    fn orders(
        &self,
        date: NaiveDate,
        position: &Position,
        today: &[SignalRow],
        exchange: &Exchange,
        deal: DealPrice,
        total_value: Decimal,
    ) -> Vec<Order> {
        // Rank: score descending, instrument id ascending on ties
        let mut ranked: Vec<&SignalRow> = today.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.instrument.cmp(&b.instrument))
        });
        let rank: HashMap<&str, usize> = ranked
            .iter()
            .enumerate()
            .map(|(i, row)| (row.instrument.as_str(), i))
            .collect();

        // Held names from best to worst; unscored names sink to the bottom
        let mut held = position.instruments();
        held.sort_by_key(|name| (rank.get(name).copied().unwrap_or(usize::MAX), *name));

        let candidates: Vec<&SignalRow> = ranked
            .iter()
            .filter(|row| !position.holds(&row.instrument))
            .copied()
            .collect();

        let fill = self.topk.saturating_sub(held.len());
        let swaps = self
            .n_drop
            .min(held.len())
            .min(candidates.len().saturating_sub(fill));
        let n_buys = (fill + swaps).min(candidates.len());

        let mut orders = Vec::with_capacity(swaps + n_buys);
        for name in &held[held.len() - swaps..] {
            orders.push(Order {
                instrument: name.to_string(),
                direction: Direction::Sell,
                shares: position.shares(name),
                date,
            });
        }

        let notional = self.buy_notional(total_value);
        for row in &candidates[..n_buys] {
            let Some(price) = exchange.deal_price(date, &row.instrument, deal) else {
                continue;
            };
            if price <= Decimal::ZERO {
                continue;
            }
            let shares =
                (notional / price).round_dp_with_strategy(6, RoundingStrategy::ToZero);
            if shares <= Decimal::ZERO {
                continue;
            }
            orders.push(Order {
                instrument: row.instrument.clone(),
                direction: Direction::Buy,
                shares,
                date,
            });
        }
        orders
    }
}
