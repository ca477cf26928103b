//! Pipeline test: partitioned source tree → store → convert → annotate →
//! simulate, including cache round-trip consistency.

use mmlab_core::data::cache::write_parquet_atomic;
use mmlab_core::data::store::markets_to_dataframe;
use mmlab_core::data::{convert, MarketDataStore};
use mmlab_core::domain::MarketInfo;
use mmlab_runner::{run_market_backtest, BacktestConfig};
use std::fs;
use std::path::Path;

const MARKET_ID: &str = "0x218919622a6132646d149021008659d834927b2b";
const YES_TOKEN: &str = "0xtoken_yes";
const NO_TOKEN: &str = "0xtoken_no";

/// Lay out a source tree with one market and two CSV trade partitions.
///
/// Prices oscillate so some prints cross the strategy's quotes.
fn build_source(root: &Path, rows_per_partition: usize) {
    let markets_dir = root.join("markets");
    fs::create_dir_all(&markets_dir).unwrap();
    let market = MarketInfo {
        condition_id: MARKET_ID.into(),
        question: "Will the pipeline round-trip?".into(),
        category: "Tech".into(),
        outcome_token_ids: vec![YES_TOKEN.into(), NO_TOKEN.into()],
        tick_size: 0.01,
        volume: 50_000.0,
    };
    let df = markets_to_dataframe(&[market]).unwrap();
    write_parquet_atomic(&df, &markets_dir.join("markets_0_10000.parquet")).unwrap();

    let trades_dir = root.join("trades");
    fs::create_dir_all(&trades_dir).unwrap();

    let base_epoch: u64 = 1_700_000_000;
    for part in 0..2u64 {
        let start = base_epoch + part * rows_per_partition as u64 * 60;
        let end = start + rows_per_partition as u64 * 60;
        let mut body = String::from(
            "block_number,timestamp,maker_asset_id,taker_asset_id,maker_amount,taker_amount\n",
        );
        for i in 0..rows_per_partition {
            let ts = start + i as u64 * 60;
            // taker/(maker+taker) walks between ~0.40 and ~0.60
            let taker = 40.0 + 20.0 * ((i % 10) as f64 / 10.0);
            let maker = 100.0 - taker;
            let (maker_id, taker_id) = if i % 3 == 0 {
                (YES_TOKEN, "0")
            } else {
                ("0", YES_TOKEN)
            };
            body.push_str(&format!("{ts},{ts},{maker_id},{taker_id},{maker},{taker}\n"));
        }
        // A foreign trade that must be filtered out.
        body.push_str(&format!("{end},{end},0,0xother_token,50.0,50.0\n"));
        fs::write(trades_dir.join(format!("trades_{start}_{end}.csv")), body).unwrap();
    }
}

#[test]
fn source_to_result_end_to_end() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 120);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let config = BacktestConfig::default();
    let result = run_market_backtest(&mut store, MARKET_ID, &config).unwrap();

    assert_eq!(result.pnl_series.len(), 240);
    assert!(result.stats.sharpe_ratio.is_finite());
    assert!(result.stats.max_drawdown.is_finite());
}

#[test]
fn foreign_tokens_never_reach_the_simulator() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 30);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let raw = store.get_trades(MARKET_ID, None).unwrap();
    assert_eq!(raw.len(), 60, "only this market's 2×30 rows should remain");
    assert!(raw
        .iter()
        .all(|r| r.maker_asset_id != "0xother_token" && r.taker_asset_id != "0xother_token"));
}

#[test]
fn warm_cache_reproduces_cold_result() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 120);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let config = BacktestConfig::default();
    let cold = run_market_backtest(&mut store, MARKET_ID, &config).unwrap();

    // Second run hits the materialized cache; the source is gone entirely.
    drop(source);
    let warm = run_market_backtest(&mut store, MARKET_ID, &config).unwrap();

    assert_eq!(cold.trades, warm.trades);
    assert_eq!(cold.pnl_series, warm.pnl_series);
    assert_eq!(cold.stats, warm.stats);
}

#[test]
fn conversion_preserves_ordering_and_bounds() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 50);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let raw = store.get_trades(MARKET_ID, None).unwrap();
    let records = convert::to_trade_records(&raw, MARKET_ID);

    assert_eq!(records.len(), raw.len());
    assert!(records.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(records
        .iter()
        .all(|r| (0.01..=0.99).contains(&r.price) && r.size > 0.0));
    assert!(records.iter().all(|r| r.market_id == MARKET_ID));
}

#[test]
fn empty_market_fails_validation_in_backtest() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 30);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let config = BacktestConfig::default();
    let err = run_market_backtest(&mut store, "0xunknown_market", &config).unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[test]
fn clear_cache_then_rerun_matches() {
    let source = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    build_source(source.path(), 120);

    let mut store = MarketDataStore::new(source.path(), cache.path());
    let config = BacktestConfig::default();
    let first = run_market_backtest(&mut store, MARKET_ID, &config).unwrap();

    store.clear_cache();
    assert_eq!(store.cache_stats().trades_cached, 0);

    let second = run_market_backtest(&mut store, MARKET_ID, &config).unwrap();
    assert_eq!(first.stats, second.stats);
    assert_eq!(store.cache_stats().trades_cached, 1);
}
