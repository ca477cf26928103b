//! Backtest result artifact and aggregate statistics.

use crate::metrics;
use crate::simulator::ExecutedTrade;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Scalar statistics of one run. Every field is finite by construction —
/// degenerate inputs produce 0.0, never NaN.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_pnl: f64,
    pub return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
}

/// Immutable summary of a completed run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestResult {
    pub trades: Vec<ExecutedTrade>,
    pub pnl_series: Vec<f64>,
    pub stats: PerformanceStats,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl BacktestResult {
    /// Assemble the result from the run's raw outputs.
    pub fn from_run(
        trades: Vec<ExecutedTrade>,
        pnl_series: Vec<f64>,
        initial_capital: f64,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Self {
        let total_pnl = metrics::total_pnl(&trades);
        let return_pct = if initial_capital > 0.0 {
            total_pnl / initial_capital * 100.0
        } else {
            0.0
        };
        let cumulative = metrics::cumulative_pnl(&pnl_series);

        let completed: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();
        let winning_trades = completed.iter().filter(|&&p| p > 0.0).count();
        let losing_trades = completed.iter().filter(|&&p| p < 0.0).count();

        let stats = PerformanceStats {
            total_pnl,
            return_pct,
            sharpe_ratio: metrics::sharpe_ratio(&pnl_series, metrics::PERIODS_PER_YEAR),
            max_drawdown: metrics::max_drawdown(&cumulative),
            win_rate: metrics::win_rate(&trades),
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
        };

        Self {
            trades,
            pnl_series,
            stats,
            start,
            end,
        }
    }

    /// Save the result as a JSON artifact.
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
    }
}
