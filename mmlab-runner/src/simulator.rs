//! The backtest simulator: drives time-ordered market rows through the
//! risk gate and order pricer, executes passive maker fills, and collects
//! the per-step PnL series.

use crate::config::StrategyParams;
use crate::result::BacktestResult;
use chrono::NaiveDateTime;
use mmlab_core::domain::{OrderBookSnapshot, PositionState, Side};
use mmlab_core::pricing::OrderPricer;
use mmlab_core::risk::RiskGate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Minimum number of rows for a meaningful run.
pub const MIN_ROWS: usize = 10;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("empty market data")]
    EmptyInput,

    #[error("insufficient data: {rows} rows, need at least {min}")]
    InsufficientRows { rows: usize, min: usize },

    #[error(transparent)]
    Data(#[from] mmlab_core::data::DataError),
}

/// Trading decision for one row. Fixed tagged union, matched exhaustively —
/// no open-ended strategy dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// One fully annotated input row: trade print, volatility signal, and the
/// order-book state at that moment.
#[derive(Debug, Clone)]
pub struct MarketRow {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub size: f64,
    pub side: Side,
    /// Rolling volatility; NaN while the window is still warming up.
    pub volatility: f64,
    pub order_book: OrderBookSnapshot,
    pub tick_size: f64,
}

/// An executed (simulated) fill. `pnl` is set only on closing trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedTrade {
    pub timestamp: NaiveDateTime,
    pub action: Side,
    pub size: f64,
    pub price: f64,
    pub pnl: Option<f64>,
    pub position_after: f64,
    pub fee: f64,
}

/// Per-run simulator state. Owns its risk gate and position; one instance
/// must not be shared across concurrent backtests.
pub struct BacktestSimulator {
    params: StrategyParams,
    pricer: OrderPricer,
    gate: RiskGate,
    position: PositionState,
}

impl BacktestSimulator {
    pub fn new(params: StrategyParams) -> Self {
        let gate = params.risk_gate();
        Self {
            params,
            pricer: OrderPricer::default(),
            gate,
            position: PositionState::default(),
        }
    }

    /// Reset mutable state so the simulator can be reused for another run.
    pub fn reset(&mut self) {
        self.gate = self.params.risk_gate();
        self.position = PositionState::default();
    }

    pub fn position(&self) -> &PositionState {
        &self.position
    }

    /// Run the full simulation over chronologically ordered rows.
    pub fn run(
        &mut self,
        rows: &[MarketRow],
        initial_capital: f64,
    ) -> Result<BacktestResult, BacktestError> {
        if rows.is_empty() {
            return Err(BacktestError::EmptyInput);
        }
        if rows.len() < MIN_ROWS {
            return Err(BacktestError::InsufficientRows {
                rows: rows.len(),
                min: MIN_ROWS,
            });
        }

        self.reset();

        let mut trades: Vec<ExecutedTrade> = Vec::new();
        let mut pnl_series: Vec<f64> = Vec::with_capacity(rows.len());

        for row in rows {
            let realized = self.step(row, &mut trades);
            pnl_series.push(realized);
        }

        Ok(BacktestResult::from_run(
            trades,
            pnl_series,
            initial_capital,
            rows.first().map(|r| r.timestamp),
            rows.last().map(|r| r.timestamp),
        ))
    }

    /// Process one row; returns the PnL realized at this step.
    fn step(&mut self, row: &MarketRow, trades: &mut Vec<ExecutedTrade>) -> f64 {
        let quote = self
            .pricer
            .quote(&row.order_book, self.position.avg_price, self.position.position, row.tick_size);
        let spread = row.order_book.spread().unwrap_or_else(|| quote.spread());

        // Stop-loss first: a forced exit preempts quoting for this row.
        // Closing is never gated on volatility or cooldown state.
        if self.position.position > 0.0 {
            let pnl_pct = self.position.unrealized_pnl_pct(row.price);
            if self.gate.should_trigger_stop_loss(pnl_pct, spread) {
                self.gate.trigger_risk_off(row.timestamp);
                let size = self.position.position;
                let pnl = self.position.apply_sell(size, row.price);
                debug!(ts = %row.timestamp, pnl, "stop loss fired, position closed");
                trades.push(ExecutedTrade {
                    timestamp: row.timestamp,
                    action: Side::Sell,
                    size,
                    price: row.price,
                    pnl: Some(pnl),
                    position_after: self.position.position,
                    fee: 0.0,
                });
                return pnl;
            }
        }

        let ask = self
            .gate
            .adjust_ask_for_take_profit(quote.ask, self.position.avg_price);

        match self.signal(row, quote.bid, ask) {
            Signal::Buy => {
                let size = self
                    .params
                    .trade_size
                    .min(self.params.max_position_size - self.position.position);
                if !self.gate.is_valid_trade_size(size) {
                    return 0.0;
                }
                self.position.apply_buy(size, quote.bid);
                trades.push(ExecutedTrade {
                    timestamp: row.timestamp,
                    action: Side::Buy,
                    size,
                    price: quote.bid,
                    pnl: None,
                    position_after: self.position.position,
                    fee: 0.0,
                });
                0.0
            }
            Signal::Sell => {
                let size = self.params.trade_size.min(self.position.position);
                if !self.gate.is_valid_trade_size(size) {
                    return 0.0;
                }
                let pnl = self.position.apply_sell(size, ask);
                trades.push(ExecutedTrade {
                    timestamp: row.timestamp,
                    action: Side::Sell,
                    size,
                    price: ask,
                    pnl: Some(pnl),
                    position_after: self.position.position,
                    fee: 0.0,
                });
                pnl
            }
            Signal::Hold => 0.0,
        }
    }

    /// Passive maker policy: a row whose print crosses the quoted bid fills
    /// the bid; one that crosses the (take-profit-floored) ask with
    /// inventory on hand fills the ask.
    fn signal(&self, row: &MarketRow, bid: f64, ask: f64) -> Signal {
        let can_open = self.gate.can_open_new_position(row.volatility, row.timestamp)
            && self.gate.can_increase_position(self.position.position);

        if row.price <= bid && can_open && RiskGate::is_valid_buy_price(bid) {
            return Signal::Buy;
        }

        if self.position.position > 0.0
            && row.price >= ask
            && RiskGate::is_valid_sell_price(ask)
        {
            return Signal::Sell;
        }

        Signal::Hold
    }
}
