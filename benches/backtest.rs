//! Benchmarks for the backtest engine

use alpha_lab::backtest::{BacktestEngine, Exchange, Quote, TopkDropoutStrategy};
use alpha_lab::config::{BacktestConfig, StrategyConfig};
use alpha_lab::data::{Signal, SignalRow};
use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

fn fixture(days: u32, instruments: usize) -> (Exchange, Signal) {
    let mut exchange = Exchange::new();
    let mut rows = Vec::new();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    for day in 0..days {
        let date = start + chrono::Duration::days(day as i64);
        for i in 0..instruments {
            let name = format!("INST-{i:03}");
            let price = Decimal::new(1000 + ((day as i64 * 17 + i as i64 * 31) % 200), 1);
            exchange.insert(
                date,
                name.clone(),
                Quote {
                    open: price,
                    close: price,
                    change: 0.01,
                },
            );
            rows.push(SignalRow {
                date,
                instrument: name,
                score: ((day as usize * 13 + i * 7) % 101) as f64 / 101.0,
            });
        }
    }
    (exchange, Signal::from_rows(rows).unwrap())
}

fn benchmark_engine_replay(c: &mut Criterion) {
    let (exchange, signal) = fixture(60, 100);
    let strategy = TopkDropoutStrategy::new(&StrategyConfig {
        topk: 10,
        n_drop: 2,
        ..Default::default()
    })
    .unwrap();
    let config = BacktestConfig {
        account: Decimal::new(1_000_000, 0),
        ..Default::default()
    };
    let engine = BacktestEngine::new(config, &exchange, strategy).unwrap();

    c.bench_function("backtest_replay_60x100", |b| {
        b.iter(|| engine.run(black_box(&signal)).unwrap())
    });
}

criterion_group!(benches, benchmark_engine_replay);
criterion_main!(benches);
