//! Position tracking for a single strategy run.

use serde::{Deserialize, Serialize};

/// Signed inventory with size-weighted average entry price and cash.
///
/// Owned by exactly one backtest run; mutated only through fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionState {
    pub position: f64,
    pub avg_price: f64,
    pub cash: f64,
}

impl PositionState {
    pub fn is_flat(&self) -> bool {
        self.position == 0.0
    }

    /// Mark-to-market PnL of the open position.
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.position * (current_price - self.avg_price)
    }

    /// Unrealized PnL as a percentage of the average entry price.
    ///
    /// Returns 0.0 when flat or the entry price is degenerate, so the risk
    /// gate never sees a NaN.
    pub fn unrealized_pnl_pct(&self, current_price: f64) -> f64 {
        if self.position == 0.0 || self.avg_price <= 0.0 {
            return 0.0;
        }
        (current_price - self.avg_price) / self.avg_price * 100.0
    }

    /// Apply a buy fill: blend the average price size-weighted, grow the
    /// position, spend cash.
    pub fn apply_buy(&mut self, size: f64, price: f64) {
        let total = self.position + size;
        if total > 0.0 {
            self.avg_price = (self.avg_price * self.position + price * size) / total;
        }
        self.position = total;
        self.cash -= size * price;
    }

    /// Apply a sell fill and return the realized PnL.
    ///
    /// The average price is left untouched while inventory remains and reset
    /// to zero once the position is fully closed.
    pub fn apply_sell(&mut self, size: f64, price: f64) -> f64 {
        let pnl = size * (price - self.avg_price);
        self.position -= size;
        self.cash += size * price;
        if self.position <= f64::EPSILON {
            self.position = 0.0;
            self.avg_price = 0.0;
        }
        pnl
    }
}
