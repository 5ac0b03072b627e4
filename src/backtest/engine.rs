//! Backtest engine
//!
//! Deterministic day-by-day replay: strategy decisions, order execution with
//! transaction costs and limit handling, and exact account bookkeeping.

use super::account::{DailyRecord, TradeAccount};
use super::exchange::Exchange;
use super::position::Position;
use super::strategy::Strategy;
use super::types::{BacktestError, Direction};
use crate::config::BacktestConfig;
use crate::data::Signal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;

/// Replays a signal through the simulated market
pub struct BacktestEngine<'a, S: Strategy> {
    config: BacktestConfig,
    exchange: &'a Exchange,
    strategy: S,
}

impl<'a, S: Strategy> BacktestEngine<'a, S> {
    /// Create an engine over validated configuration
    pub fn new(
        config: BacktestConfig,
        exchange: &'a Exchange,
        strategy: S,
    ) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self {
            config,
            exchange,
            strategy,
        })
    }

    /// Run the replay over the signal's trading dates
    ///
    /// One simulated day per signal date, strictly increasing. Holdings are
    /// marked at the day's close, carrying the last known price when a quote
    /// is missing. Unaffordable buys are scaled down and untradeable
    /// instruments skipped; neither aborts the run.
    pub fn run(&self, signal: &Signal) -> Result<TradeAccount, BacktestError> {
        if signal.is_empty() {
            return Err(BacktestError::InsufficientData(
                "signal has no rows".to_string(),
            ));
        }

        let mut position = Position::new(self.config.account);
        let mut marks: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut account = TradeAccount::new(self.config.account);
        let mut prev_total = self.config.account;

        for date in signal.dates() {
            let today = signal.on_date(date);

            // Refresh close marks for today's signal names and current holdings
            let held: Vec<String> = position
                .instruments()
                .iter()
                .map(|s| s.to_string())
                .collect();
            for instrument in today
                .iter()
                .map(|r| r.instrument.as_str())
                .chain(held.iter().map(String::as_str))
            {
                if let Some(quote) = self.exchange.quote(date, instrument) {
                    marks.insert(instrument.to_string(), quote.close);
                }
            }

            let open_value = position.total_value(&marks);
            let orders = self.strategy.orders(
                date,
                &position,
                today,
                self.exchange,
                self.config.deal_price,
                open_value,
            );

            let mut cost_paid = Decimal::ZERO;
            let mut traded = Decimal::ZERO;
            for order in orders {
                if !self
                    .exchange
                    .tradeable(date, &order.instrument, self.config.limit_threshold)
                {
                    tracing::debug!(
                        %date,
                        instrument = %order.instrument,
                        "Order dropped, instrument untradeable"
                    );
                    continue;
                }
                let Some(price) =
                    self.exchange
                        .deal_price(date, &order.instrument, self.config.deal_price)
                else {
                    continue;
                };

                match order.direction {
                    Direction::Sell => {
                        let shares = order.shares.min(position.shares(&order.instrument));
                        if shares <= Decimal::ZERO {
                            continue;
                        }
                        let proceeds = shares * price;
                        let cost =
                            trade_cost(proceeds, self.config.close_cost, self.config.min_cost);
                        position.sell(&order.instrument, shares, price, cost);
                        cost_paid += cost;
                        traded += proceeds;
                    }
                    Direction::Buy => {
                        let (shares, cost) = affordable_buy(
                            order.shares,
                            price,
                            self.config.open_cost,
                            self.config.min_cost,
                            position.cash(),
                        );
                        if shares <= Decimal::ZERO {
                            tracing::debug!(
                                %date,
                                instrument = %order.instrument,
                                "Buy skipped, no affordable quantity"
                            );
                            continue;
                        }
                        position.buy(&order.instrument, shares, price, cost);
                        cost_paid += cost;
                        traded += shares * price;
                    }
                }
            }

            let total_value = position.total_value(&marks);
            let gross_return = if prev_total.is_zero() {
                0.0
            } else {
                ((total_value + cost_paid - prev_total) / prev_total)
                    .to_f64()
                    .unwrap_or(0.0)
            };
            let bench_return = self
                .exchange
                .quote(date, &self.config.benchmark)
                .map(|q| q.change)
                .unwrap_or(0.0);
            let turnover = if prev_total.is_zero() {
                Decimal::ZERO
            } else {
                traded / prev_total
            };

            if self.config.verbose {
                tracing::info!(
                    %date,
                    total = %total_value,
                    cash = %position.cash(),
                    holdings = position.count(),
                    cost = %cost_paid,
                    "Day settled"
                );
            } else {
                tracing::debug!(%date, total = %total_value, holdings = position.count(), "Day settled");
            }

            account.append(DailyRecord {
                date,
                total_value,
                cash: position.cash(),
                cost_paid,
                turnover,
                gross_return,
                bench_return,
            });
            prev_total = total_value;
        }

        Ok(account)
    }
}

fn trade_cost(notional: Decimal, rate: Decimal, min_cost: Decimal) -> Decimal {
    (notional * rate).max(min_cost)
}

/// Scale a buy down to what cash can cover, cost included
///
/// Returns (shares, cost); shares is zero when nothing is affordable.
fn affordable_buy(
    target: Decimal,
    price: Decimal,
    rate: Decimal,
    min_cost: Decimal,
    cash: Decimal,
) -> (Decimal, Decimal) {
    if price <= Decimal::ZERO || target <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let notional = target * price;
    let cost = trade_cost(notional, rate, min_cost);
    if notional + cost <= cash {
        return (target, cost);
    }

    // Proportional-cost regime first; fall back to the min-cost floor regime
    let mut scaled = cash / (price * (Decimal::ONE + rate));
    if scaled * price * rate < min_cost {
        scaled = (cash - min_cost) / price;
    }
    let shares = scaled
        .max(Decimal::ZERO)
        .round_dp_with_strategy(6, RoundingStrategy::ToZero);
    if shares <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let notional = shares * price;
    let cost = trade_cost(notional, rate, min_cost);
    if notional + cost > cash {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    (shares, cost)
}
