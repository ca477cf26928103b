//! Performance metrics — pure functions over the PnL series and trade log.
//!
//! Every metric returns a defined neutral value (0.0) on degenerate input:
//! no NaN from an empty run, a single observation, or zero variance ever
//! reaches a result.

use crate::simulator::ExecutedTrade;

/// Annualization factor for the Sharpe ratio.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Total realized PnL across completed trades.
pub fn total_pnl(trades: &[ExecutedTrade]) -> f64 {
    trades.iter().filter_map(|t| t.pnl).sum()
}

/// Cumulative PnL curve from the per-step series.
pub fn cumulative_pnl(pnl_series: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(pnl_series.len());
    let mut acc = 0.0;
    for pnl in pnl_series {
        acc += pnl;
        out.push(acc);
    }
    out
}

/// Annualized Sharpe ratio: `mean / std(sample) × sqrt(periods_per_year)`.
///
/// 0.0 with fewer than two observations or zero variance.
pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
    let clean: Vec<f64> = returns.iter().copied().filter(|r| r.is_finite()).collect();
    if clean.len() < 2 {
        return 0.0;
    }
    let mean = clean.iter().sum::<f64>() / clean.len() as f64;
    let variance = clean.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (clean.len() - 1) as f64;
    let std = variance.sqrt();
    if std < 1e-15 {
        return 0.0;
    }
    mean / std * periods_per_year.sqrt()
}

/// Maximum drawdown of a cumulative PnL curve: the most negative value of
/// `cum[i] − running_max(cum)[0..=i]`. 0.0 for an empty curve.
pub fn max_drawdown(cumulative: &[f64]) -> f64 {
    let mut running_max = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in cumulative {
        if value > running_max {
            running_max = value;
        }
        let dd = value - running_max;
        if dd < max_dd {
            max_dd = dd;
        }
    }
    max_dd
}

/// Fraction of completed trades with positive PnL; 0.0 when none completed.
pub fn win_rate(trades: &[ExecutedTrade]) -> f64 {
    let completed: Vec<f64> = trades.iter().filter_map(|t| t.pnl).collect();
    if completed.is_empty() {
        return 0.0;
    }
    let winners = completed.iter().filter(|&&pnl| pnl > 0.0).count();
    winners as f64 / completed.len() as f64
}
