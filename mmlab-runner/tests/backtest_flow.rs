//! End-to-end backtest flow over synthetic market data.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use mmlab_core::domain::{Side, TradeRecord};
use mmlab_runner::{prepare_rows, BacktestError, BacktestSimulator, StrategyParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn base_ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Random-walk trade tape around 0.50, seeded for reproducibility.
fn synthetic_trades(n: usize, seed: u64) -> Vec<TradeRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price: f64 = 0.50;
    (0..n)
        .map(|i| {
            price = (price + rng.gen_range(-0.01..0.01)).clamp(0.05, 0.95);
            TradeRecord {
                timestamp: base_ts() + Duration::minutes(i as i64),
                market_id: "0xsynthetic".into(),
                price,
                size: rng.gen_range(5.0..200.0),
                side: if rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
            }
        })
        .collect()
}

#[test]
fn full_run_produces_consistent_result() {
    let trades = synthetic_trades(2_000, 7);
    let rows = prepare_rows(&trades, 0.01, Duration::hours(3), 10);
    let mut sim = BacktestSimulator::new(StrategyParams::default());
    let result = sim.run(&rows, 10_000.0).unwrap();

    // Series aligned to input.
    assert_eq!(result.pnl_series.len(), rows.len());

    // Aggregates agree with the trade log.
    let manual_pnl: f64 = result.trades.iter().filter_map(|t| t.pnl).sum();
    assert!((result.stats.total_pnl - manual_pnl).abs() < 1e-9);
    assert!((result.stats.return_pct - manual_pnl / 10_000.0 * 100.0).abs() < 1e-9);

    // Every statistic is finite and well-formed.
    assert!(result.stats.sharpe_ratio.is_finite());
    assert!(result.stats.max_drawdown.is_finite());
    assert!(result.stats.max_drawdown <= 0.0);
    assert!((0.0..=1.0).contains(&result.stats.win_rate));

    let completed: Vec<f64> = result.trades.iter().filter_map(|t| t.pnl).collect();
    let flat = completed.iter().filter(|&&p| p == 0.0).count();
    assert_eq!(
        result.stats.winning_trades + result.stats.losing_trades,
        completed.len() - flat
    );
}

#[test]
fn every_fill_respects_size_and_position_limits() {
    let trades = synthetic_trades(2_000, 11);
    let params = StrategyParams::default();
    let rows = prepare_rows(&trades, 0.01, Duration::hours(3), 10);
    let mut sim = BacktestSimulator::new(params.clone());
    let result = sim.run(&rows, 10_000.0).unwrap();

    for fill in &result.trades {
        assert!(fill.size >= params.min_size, "dust fill: {}", fill.size);
        assert!(fill.position_after <= params.max_position_size + 1e-9);
        assert!(fill.position_after >= 0.0);
        match fill.action {
            Side::Buy => {
                // Entries never exceed the configured clip.
                assert!(fill.size <= params.trade_size + 1e-9);
                assert!(fill.pnl.is_none());
            }
            Side::Sell => {
                // A stop-loss close flattens the whole position, so sells
                // are bounded by the cap rather than the clip.
                assert!(fill.size <= params.max_position_size + 1e-9);
                assert!(fill.pnl.is_some());
            }
        }
        assert!((0.01..=0.99).contains(&fill.price));
    }
}

#[test]
fn runs_are_deterministic() {
    let trades = synthetic_trades(1_000, 23);
    let rows = prepare_rows(&trades, 0.01, Duration::hours(3), 10);

    let mut sim_a = BacktestSimulator::new(StrategyParams::default());
    let mut sim_b = BacktestSimulator::new(StrategyParams::default());
    let a = sim_a.run(&rows, 10_000.0).unwrap();
    let b = sim_b.run(&rows, 10_000.0).unwrap();

    assert_eq!(a.trades, b.trades);
    assert_eq!(a.pnl_series, b.pnl_series);
    assert_eq!(a.stats, b.stats);
}

#[test]
fn parameter_override_changes_behavior() {
    let trades = synthetic_trades(2_000, 7);
    let rows = prepare_rows(&trades, 0.01, Duration::hours(3), 10);

    let conservative = StrategyParams {
        stop_loss_threshold: -3.0,
        take_profit_threshold: 2.0,
        ..Default::default()
    };
    let aggressive = StrategyParams {
        stop_loss_threshold: -10.0,
        take_profit_threshold: 5.0,
        ..Default::default()
    };

    let res_cons = BacktestSimulator::new(conservative)
        .run(&rows, 10_000.0)
        .unwrap();
    let res_aggr = BacktestSimulator::new(aggressive)
        .run(&rows, 10_000.0)
        .unwrap();

    // Both complete; the stricter stop produces at least as many forced
    // exits is not guaranteed on every tape, but both must stay well-formed.
    assert!(res_cons.stats.sharpe_ratio.is_finite());
    assert!(res_aggr.stats.sharpe_ratio.is_finite());
}

#[test]
fn high_volatility_tape_trades_less() {
    // Violent alternation produces a volatility signal far above the gate.
    let base = base_ts();
    let wild: Vec<TradeRecord> = (0..500)
        .map(|i| TradeRecord {
            timestamp: base + Duration::minutes(i as i64),
            market_id: "0xwild".into(),
            price: if i % 2 == 0 { 0.30 } else { 0.70 },
            size: 50.0,
            side: Side::Buy,
        })
        .collect();
    let rows = prepare_rows(&wild, 0.01, Duration::hours(3), 10);

    // Once the window is warm, the signal must be far above the threshold.
    let warm_vol = rows.last().unwrap().volatility;
    assert!(warm_vol > 0.15, "expected extreme volatility, got {warm_vol}");

    let mut sim = BacktestSimulator::new(StrategyParams::default());
    let result = sim.run(&rows, 10_000.0).unwrap();
    // New exposure is gated while the signal is hot; the warm-up prefix is
    // the only region where entries could slip through.
    let entries_after_warmup = result
        .trades
        .iter()
        .filter(|t| t.action == Side::Buy && t.timestamp > base + Duration::minutes(15))
        .count();
    assert_eq!(entries_after_warmup, 0);
}

#[test]
fn empty_and_undersized_inputs_fail() {
    let mut sim = BacktestSimulator::new(StrategyParams::default());
    assert!(matches!(
        sim.run(&[], 10_000.0),
        Err(BacktestError::EmptyInput)
    ));

    let tiny = prepare_rows(&synthetic_trades(5, 1), 0.01, Duration::hours(3), 10);
    assert!(matches!(
        sim.run(&tiny, 10_000.0),
        Err(BacktestError::InsufficientRows { .. })
    ));
}
