//! The load → convert → annotate → simulate pipeline.

use crate::config::BacktestConfig;
use crate::result::BacktestResult;
use crate::simulator::{BacktestError, BacktestSimulator, MarketRow};
use chrono::Duration;
use mmlab_core::data::store::TimeRange;
use mmlab_core::data::{convert, MarketDataStore};
use mmlab_core::domain::{MarketInfo, OrderBookSnapshot, TradeRecord};
use mmlab_core::volatility::{rolling_volatility, DEFAULT_MIN_POINTS, DEFAULT_WINDOW_HOURS};
use tracing::info;

/// Annotate converted trades into simulator rows: rolling volatility plus
/// an order-book snapshot reconstructed from the trailing window at each
/// step.
pub fn prepare_rows(
    trades: &[TradeRecord],
    tick_size: f64,
    window: Duration,
    min_points: usize,
) -> Vec<MarketRow> {
    let mut ordered = trades.to_vec();
    ordered.sort_by_key(|t| t.timestamp);

    let points: Vec<_> = ordered.iter().map(|t| (t.timestamp, t.price)).collect();
    let vols = rolling_volatility(&points, window, min_points);

    ordered
        .iter()
        .enumerate()
        .map(|(i, trade)| MarketRow {
            timestamp: trade.timestamp,
            price: trade.price,
            size: trade.size,
            side: trade.side,
            volatility: vols[i],
            order_book: OrderBookSnapshot::from_trailing_window(&ordered[..=i]),
            tick_size,
        })
        .collect()
}

/// Run a full backtest for one market out of the store.
pub fn run_market_backtest(
    store: &mut MarketDataStore,
    market_id: &str,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    let range = if config.start.is_some() || config.end.is_some() {
        Some(TimeRange {
            start: config.start,
            end: config.end,
        })
    } else {
        None
    };

    let raw = store.get_trades(market_id, range)?;
    let records = convert::to_trade_records(&raw, market_id);
    info!(market_id, rows = records.len(), "market data prepared");

    let tick_size = store
        .get_market_info(market_id)
        .map(|info| info.tick_size)
        .unwrap_or(MarketInfo::DEFAULT_TICK_SIZE);

    let rows = prepare_rows(
        &records,
        tick_size,
        Duration::hours(DEFAULT_WINDOW_HOURS),
        DEFAULT_MIN_POINTS,
    );

    let mut simulator = BacktestSimulator::new(config.params.clone());
    simulator.run(&rows, config.initial_capital)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mmlab_core::domain::Side;

    fn trades(n: usize) -> Vec<TradeRecord> {
        let base = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        (0..n)
            .map(|i| TradeRecord {
                timestamp: base + Duration::minutes(i as i64),
                market_id: "m".into(),
                price: 0.50 + 0.01 * ((i % 4) as f64),
                size: 25.0,
                side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
            })
            .collect()
    }

    #[test]
    fn rows_aligned_and_sorted() {
        let mut input = trades(30);
        input.reverse(); // out of order on purpose
        let rows = prepare_rows(&input, 0.01, Duration::hours(3), 10);

        assert_eq!(rows.len(), 30);
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn volatility_warms_up_then_defined() {
        let rows = prepare_rows(&trades(30), 0.01, Duration::hours(3), 10);
        assert!(rows[0].volatility.is_nan());
        assert!(rows.last().unwrap().volatility.is_finite());
    }

    #[test]
    fn order_book_present_on_every_row() {
        let rows = prepare_rows(&trades(30), 0.01, Duration::hours(3), 10);
        for row in &rows {
            assert!(row.order_book.is_valid());
            let (bid, ask) = (
                row.order_book.best_bid.unwrap(),
                row.order_book.best_ask.unwrap(),
            );
            assert!(bid < ask);
        }
    }

    #[test]
    fn tick_size_propagated() {
        let rows = prepare_rows(&trades(12), 0.001, Duration::hours(3), 10);
        assert!(rows.iter().all(|r| r.tick_size == 0.001));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(prepare_rows(&[], 0.01, Duration::hours(3), 10).is_empty());
    }
}
