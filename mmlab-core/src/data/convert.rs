//! Conversion from raw partition rows to the strategy trade format.

use super::schema::{epoch_to_datetime, RawTrade};
use crate::domain::{Side, TradeRecord};

/// Asset id of the collateral leg. A trade whose maker side is collateral
/// is a buy of the outcome token.
const COLLATERAL_ASSET_ID: &str = "0";

/// Convert raw rows to [`TradeRecord`]s for one market.
///
/// - `price = taker_amount / (maker_amount + taker_amount)`, clipped to
///   [0.01, 0.99] (binary-market convention)
/// - `size = maker_amount + taker_amount`
/// - missing timestamps fall back to the block number read as epoch seconds,
///   preserving the source's temporal ordering key
///
/// Rows with a non-positive or non-finite total amount are dropped.
pub fn to_trade_records(rows: &[RawTrade], market_id: &str) -> Vec<TradeRecord> {
    rows.iter()
        .filter_map(|row| {
            let total = row.maker_amount + row.taker_amount;
            if !total.is_finite() || total <= 0.0 {
                return None;
            }
            let timestamp = row
                .timestamp
                .or_else(|| epoch_to_datetime(row.block_number as i64))?;
            let price = (row.taker_amount / total).clamp(0.01, 0.99);
            let side = if row.maker_asset_id == COLLATERAL_ASSET_ID {
                Side::Buy
            } else {
                Side::Sell
            };
            Some(TradeRecord {
                timestamp,
                market_id: market_id.to_string(),
                price,
                size: total,
                side,
            })
        })
        .collect()
}
