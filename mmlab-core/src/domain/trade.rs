//! TradeRecord — the authoritative unit of historical market activity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Aggressor side of a historical trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// A single historical trade for one market.
///
/// Immutable once produced by the data source. Prices live on [0.01, 0.99]
/// (binary-outcome convention); sizes are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub timestamp: NaiveDateTime,
    pub market_id: String,
    pub price: f64,
    pub size: f64,
    pub side: Side,
}
