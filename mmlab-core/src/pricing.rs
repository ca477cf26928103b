//! Order pricing: depth-scaled spread around the mid, quoted behind the
//! touch, skewed by inventory, aligned to the tick grid.

use crate::domain::OrderBookSnapshot;
use serde::{Deserialize, Serialize};

/// Base half-book offset used when one side of the book is missing.
const SYNTH_SIDE_OFFSET: f64 = 0.02;

/// Starting spread before the depth adjustment.
const BASE_SPREAD: f64 = 0.02;

/// Spread bounds after depth scaling.
const MIN_SPREAD: f64 = 0.01;
const MAX_SPREAD: f64 = 0.05;

/// Quoted price floor/ceiling (binary-outcome convention).
const PRICE_FLOOR: f64 = 0.01;
const PRICE_CEIL: f64 = 0.99;

/// A two-sided quote. Postconditions on construction via [`OrderPricer::quote`]:
/// `bid < ask`, both within [0.01, 0.99], both tick-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// Book-imbalance classification from the depth sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Imbalance {
    BuyHeavy,
    SellHeavy,
    Balanced,
}

/// Round a price to the nearest tick, half away from zero.
///
/// Idempotent; a non-positive tick passes the price through unchanged.
pub fn round_to_tick(price: f64, tick_size: f64) -> f64 {
    if tick_size <= 0.0 {
        return price;
    }
    (price / tick_size).round() * tick_size
}

/// Spread sanity check used before placing a quote.
pub fn is_valid_spread(bid: f64, ask: f64, min_spread: f64, max_spread: f64) -> bool {
    if bid <= 0.0 || ask <= 0.0 || bid >= ask {
        return false;
    }
    let spread = ask - bid;
    (min_spread..=max_spread).contains(&spread)
}

/// Should the quote shift toward the heavier side of the book?
///
/// Depth ratio `bid_depth_sum / ask_depth_sum` above `ratio_threshold` is
/// buy-heavy, below its reciprocal sell-heavy. Zero ask depth counts as
/// buy-heavy outright.
pub fn should_adjust_for_imbalance(
    book: &OrderBookSnapshot,
    ratio_threshold: f64,
) -> (bool, Imbalance) {
    if book.ask_depth_sum == 0.0 {
        return (true, Imbalance::BuyHeavy);
    }
    let ratio = book.bid_depth_sum / book.ask_depth_sum;
    if ratio > ratio_threshold {
        (true, Imbalance::BuyHeavy)
    } else if ratio < 1.0 / ratio_threshold {
        (true, Imbalance::SellHeavy)
    } else {
        (false, Imbalance::Balanced)
    }
}

/// Nudge a quote toward the heavier side.
///
/// The near quote moves by the full factor, the far quote by half, so the
/// spread widens slightly in the direction of pressure.
pub fn adjust_for_imbalance(
    bid: f64,
    ask: f64,
    direction: Imbalance,
    adjustment_factor: f64,
) -> (f64, f64) {
    match direction {
        Imbalance::BuyHeavy => (bid + adjustment_factor * 0.5, ask + adjustment_factor),
        Imbalance::SellHeavy => (bid - adjustment_factor, ask - adjustment_factor * 0.5),
        Imbalance::Balanced => (bid, ask),
    }
}

/// Buy and sell order sizes for the current inventory.
///
/// Buys are capped by the room left under `max_size` and zeroed entirely
/// while the opposite outcome's position exceeds `min_size`. Sells are
/// capped by the position on hand. Either side below `min_size` is zeroed.
pub fn order_size(
    position: f64,
    trade_size: f64,
    max_size: f64,
    min_size: f64,
    opposite_position: f64,
) -> (f64, f64) {
    let room = (max_size - position).max(0.0);
    let mut buy_amount = trade_size.min(room);
    if opposite_position > min_size || buy_amount < min_size {
        buy_amount = 0.0;
    }

    let mut sell_amount = trade_size.min(position);
    if sell_amount < min_size {
        sell_amount = 0.0;
    }

    (buy_amount, sell_amount)
}

/// Quote computation parameters. The defaults match the market convention
/// for binary outcome tokens (1-cent tick, 1–5 cent spreads).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPricer {
    pub min_spread: f64,
    pub max_spread: f64,
    pub base_spread: f64,
}

impl Default for OrderPricer {
    fn default() -> Self {
        Self {
            min_spread: MIN_SPREAD,
            max_spread: MAX_SPREAD,
            base_spread: BASE_SPREAD,
        }
    }
}

impl OrderPricer {
    /// Compute a two-sided quote.
    ///
    /// 1. Fill in missing book sides (0.49/0.51 when empty, ±0.02 when
    ///    one-sided).
    /// 2. Scale the base spread by book depth and clamp it.
    /// 3. Center on the mid, then pull each quote at least one tick behind
    ///    the touch: the strategy adds liquidity, never competing for best
    ///    price.
    /// 4. Skew for inventory: a long position floors the ask near cost, a
    ///    short position caps the bid symmetrically.
    /// 5. Round to tick, repair any bid/ask collapse, clamp into
    ///    [0.01, 0.99].
    pub fn quote(
        &self,
        book: &OrderBookSnapshot,
        avg_price: f64,
        position: f64,
        tick_size: f64,
    ) -> Quote {
        let tick = if tick_size > 0.0 { tick_size } else { 0.01 };

        let (best_bid, best_ask) = match (book.best_bid, book.best_ask) {
            (None, None) => (0.5 - SYNTH_SIDE_OFFSET / 2.0, 0.5 + SYNTH_SIDE_OFFSET / 2.0),
            (Some(bid), None) => (bid, bid + SYNTH_SIDE_OFFSET),
            (None, Some(ask)) => (ask - SYNTH_SIDE_OFFSET, ask),
            (Some(bid), Some(ask)) => (bid, ask),
        };

        let mid = (best_bid + best_ask) / 2.0;

        let avg_depth = (book.bid_depth_sum + book.ask_depth_sum) / 2.0;
        let depth_factor = if avg_depth > 5000.0 {
            0.8
        } else if avg_depth > 2000.0 {
            0.9
        } else if avg_depth > 500.0 {
            1.0
        } else {
            1.2
        };
        let spread = (self.base_spread * depth_factor).clamp(self.min_spread, self.max_spread);

        let mut bid = (mid - spread / 2.0).min(best_bid - tick);
        let mut ask = (mid + spread / 2.0).max(best_ask + tick);

        // Inventory skew: long inventory floors the ask at cost protection
        // vs. the take-profit level, whichever binds; shorts mirror the bid.
        if position > 0.0 && avg_price > 0.0 {
            let min_ask = (avg_price * 0.97).max(best_ask.min(avg_price * 1.03));
            ask = ask.max(min_ask);
        }
        if position < 0.0 && avg_price > 0.0 {
            let max_bid = (avg_price * 1.03).min(best_bid.max(avg_price * 0.97));
            bid = bid.min(max_bid);
        }

        let mut bid = round_to_tick(bid, tick);
        let mut ask = round_to_tick(ask, tick);

        if bid >= ask {
            ask = round_to_tick(mid + spread / 2.0, tick);
            bid = ask - 2.0 * tick;
        }

        // Final clamp must not collapse the quote at the boundaries.
        ask = ask.clamp(PRICE_FLOOR + tick, PRICE_CEIL);
        bid = bid.clamp(PRICE_FLOOR, ask - tick);

        Quote { bid, ask }
    }
}
