//! Order-book snapshot — derived state, either supplied by the data source
//! or reconstructed from a trailing window of trades.

use super::trade::{Side, TradeRecord};
use serde::{Deserialize, Serialize};

/// Number of trailing trades used when reconstructing a snapshot.
const TRAILING_WINDOW: usize = 20;

/// Minimum synthetic spread when the trailing window shows no dispersion.
const MIN_SYNTH_SPREAD: f64 = 0.02;

/// Top-of-book state plus depth aggregates.
///
/// Invariant: when both sides are present, `best_bid < best_ask`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,
    pub best_bid_size: f64,
    pub best_ask_size: f64,
    pub bid_depth_sum: f64,
    pub ask_depth_sum: f64,
}

impl OrderBookSnapshot {
    /// At least one side must be present for the book to be usable.
    pub fn is_valid(&self) -> bool {
        self.best_bid.is_some() || self.best_ask.is_some()
    }

    /// Spread between the touch prices, if both sides are present.
    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Midpoint of the touch prices, if both sides are present.
    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid, self.best_ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / 2.0),
            _ => None,
        }
    }

    /// Reconstruct a snapshot from the trailing window of trades.
    ///
    /// Uses the mean trade price as a mid proxy and twice the price standard
    /// deviation as the spread (floored so constant prices still produce a
    /// two-sided book). Depth sums aggregate the window's sizes per side;
    /// best sizes come from the most recent trade on each side.
    pub fn from_trailing_window(trades: &[TradeRecord]) -> Self {
        let start = trades.len().saturating_sub(TRAILING_WINDOW);
        let window = &trades[start..];
        if window.is_empty() {
            return Self::default();
        }

        let n = window.len() as f64;
        let mean = window.iter().map(|t| t.price).sum::<f64>() / n;
        let var = window
            .iter()
            .map(|t| (t.price - mean).powi(2))
            .sum::<f64>()
            / n;
        let spread = (2.0 * var.sqrt()).max(MIN_SYNTH_SPREAD);

        let bid = (mean - spread / 2.0).clamp(0.01, 0.99);
        let ask = (mean + spread / 2.0).clamp(0.01, 0.99);
        // Degenerate clamp collision (mid pinned near a boundary): keep the
        // bid strictly below the ask.
        let bid = if bid >= ask { (ask - 0.01).max(0.0) } else { bid };

        let mut snapshot = OrderBookSnapshot {
            best_bid: Some(bid),
            best_ask: Some(ask),
            ..Default::default()
        };

        for trade in window {
            match trade.side {
                Side::Buy => {
                    snapshot.bid_depth_sum += trade.size;
                    snapshot.best_bid_size = trade.size;
                }
                Side::Sell => {
                    snapshot.ask_depth_sum += trade.size;
                    snapshot.best_ask_size = trade.size;
                }
            }
        }

        snapshot
    }
}
