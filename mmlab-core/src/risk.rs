//! Risk gate: stop-loss, take-profit, cooldown, position and price limits.
//!
//! The gate holds the only mutable risk state of a run (the cooldown
//! expiry). Every trading decision reads it; only a stop-loss trigger
//! writes it.

use crate::volatility::should_pause_trading;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Graded severity used by the comprehensive check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Inputs to [`RiskGate::comprehensive_risk_check`], gathered per row.
#[derive(Debug, Clone, Default)]
pub struct RiskContext {
    /// Unrealized PnL of the open position, in percent.
    pub pnl_pct: f64,
    /// Current top-of-book spread.
    pub spread: f64,
    /// Rolling volatility at this row (NaN while undefined).
    pub volatility: f64,
    /// Signed position size.
    pub position: f64,
    /// Whether the cooldown window is active.
    pub in_risk_off: bool,
}

/// Outcome of the comprehensive check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Whether new exposure may be added. Closing is never blocked.
    pub can_trade: bool,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
    pub should_stop_loss: bool,
}

/// Stateful risk-policy evaluator for one strategy run.
///
/// Not shared across runs: the cooldown expiry belongs to exactly one
/// simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskGate {
    pub stop_loss_threshold: f64,
    pub take_profit_threshold: f64,
    pub volatility_threshold: f64,
    pub max_position: f64,
    pub min_size: f64,
    pub spread_threshold: f64,
    pub sleep_period_hours: i64,
    risk_off_until: Option<NaiveDateTime>,
}

impl Default for RiskGate {
    fn default() -> Self {
        Self {
            stop_loss_threshold: -5.0,
            take_profit_threshold: 3.0,
            volatility_threshold: 0.15,
            max_position: 250.0,
            min_size: 5.0,
            spread_threshold: 0.02,
            sleep_period_hours: 6,
            risk_off_until: None,
        }
    }
}

impl RiskGate {
    /// Stop-loss fires only when the loss threshold is breached AND the
    /// market is tight enough to exit without excessive slippage. A wide
    /// spread postpones the exit rather than realizing it at a bad price.
    pub fn should_trigger_stop_loss(&self, pnl_pct: f64, spread: f64) -> bool {
        pnl_pct <= self.stop_loss_threshold && spread <= self.spread_threshold
    }

    /// Take-profit price: `avg_price × (1 + take_profit/100)`.
    pub fn take_profit_price(&self, avg_price: f64) -> f64 {
        if avg_price <= 0.0 {
            return 0.0;
        }
        avg_price * (1.0 + self.take_profit_threshold / 100.0)
    }

    /// Floor an ask at the take-profit level while a long position exists.
    pub fn adjust_ask_for_take_profit(&self, current_ask: f64, avg_price: f64) -> f64 {
        if avg_price <= 0.0 {
            return current_ask;
        }
        current_ask.max(self.take_profit_price(avg_price))
    }

    /// Start (or restart) the cooldown window from `now`. A later trigger
    /// restarts the window rather than extending the current maximum.
    pub fn trigger_risk_off(&mut self, now: NaiveDateTime) {
        self.risk_off_until = Some(now + Duration::hours(self.sleep_period_hours));
    }

    pub fn is_in_risk_off(&self, now: NaiveDateTime) -> bool {
        match self.risk_off_until {
            Some(until) => now < until,
            None => false,
        }
    }

    pub fn clear_risk_off(&mut self) {
        self.risk_off_until = None;
    }

    pub fn risk_off_until(&self) -> Option<NaiveDateTime> {
        self.risk_off_until
    }

    /// New exposure requires being outside the cooldown and below the
    /// volatility threshold.
    pub fn can_open_new_position(&self, volatility: f64, now: NaiveDateTime) -> bool {
        if self.is_in_risk_off(now) {
            return false;
        }
        !should_pause_trading(volatility, self.volatility_threshold)
    }

    /// Risk reduction is never blocked.
    pub fn can_close_position(&self) -> bool {
        true
    }

    pub fn can_increase_position(&self, position: f64) -> bool {
        position.abs() < self.max_position
    }

    /// Adding exposure on the opposite outcome is disallowed while the
    /// current side's holding exceeds the dust threshold.
    pub fn can_buy_opposite_side(&self, current_side_position: f64) -> bool {
        current_side_position <= self.min_size
    }

    pub fn is_valid_trade_size(&self, size: f64) -> bool {
        size >= self.min_size
    }

    /// Buy quotes must land on `[0.1, 0.9)`.
    pub fn is_valid_buy_price(price: f64) -> bool {
        (0.1..0.9).contains(&price)
    }

    /// Sell quotes must land on `(0.1, 0.9]`. The asymmetry vs. buys
    /// excludes the boundary on the side that would represent an already
    /// resolved market.
    pub fn is_valid_sell_price(price: f64) -> bool {
        price > 0.1 && price <= 0.9
    }

    /// Has the price deviated from a reference by at least `threshold`
    /// (as a fraction of the reference)?
    pub fn check_price_deviation(current: f64, reference: f64, threshold: f64) -> bool {
        if reference == 0.0 {
            return false;
        }
        ((current - reference) / reference).abs() >= threshold
    }

    /// Graded severity of the open position.
    pub fn position_risk_level(&self, position: f64, avg_price: f64, current_price: f64) -> RiskLevel {
        if position == 0.0 || avg_price == 0.0 {
            return RiskLevel::Low;
        }
        let pnl_pct = (current_price - avg_price) / avg_price * 100.0;

        if pnl_pct <= self.stop_loss_threshold {
            return RiskLevel::Critical;
        }
        if pnl_pct <= self.stop_loss_threshold * 0.7 {
            return RiskLevel::High;
        }
        if position.abs() >= self.max_position * 0.9 {
            RiskLevel::High
        } else if position.abs() >= self.max_position * 0.7 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Graded severity of the market environment.
    pub fn market_risk_level(&self, volatility: f64) -> RiskLevel {
        if volatility >= self.volatility_threshold * 1.5 {
            RiskLevel::Critical
        } else if volatility >= self.volatility_threshold {
            RiskLevel::High
        } else if volatility >= self.volatility_threshold * 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// Composite check with fixed precedence:
    /// stop-loss (critical, blocks, returns immediately) > risk-off (high,
    /// blocks) > volatility breach (medium, critical at 1.5×, never blocks
    /// on its own) > position cap (medium, blocks new exposure).
    pub fn comprehensive_risk_check(&self, ctx: &RiskContext) -> RiskAssessment {
        let mut result = RiskAssessment {
            can_trade: true,
            risk_level: RiskLevel::Low,
            reasons: Vec::new(),
            should_stop_loss: false,
        };

        if self.should_trigger_stop_loss(ctx.pnl_pct, ctx.spread) {
            result.can_trade = false;
            result.risk_level = RiskLevel::Critical;
            result.should_stop_loss = true;
            result.reasons.push("stop loss triggered".into());
            return result;
        }

        let vol = if ctx.volatility.is_nan() { 0.0 } else { ctx.volatility };
        if vol >= self.volatility_threshold * 1.5 {
            result.risk_level = result.risk_level.max(RiskLevel::Critical);
            result.reasons.push("extreme volatility".into());
        } else if vol >= self.volatility_threshold {
            result.risk_level = result.risk_level.max(RiskLevel::Medium);
            result.reasons.push("high volatility".into());
        }

        if ctx.in_risk_off {
            result.can_trade = false;
            result.risk_level = result.risk_level.max(RiskLevel::High);
            result.reasons.push("in risk-off period".into());
        }

        if ctx.position.abs() >= self.max_position {
            result.can_trade = false;
            result.risk_level = result.risk_level.max(RiskLevel::Medium);
            result.reasons.push("max position reached".into());
        } else if ctx.position.abs() >= self.max_position * 0.9 {
            result.risk_level = result.risk_level.max(RiskLevel::Medium);
            result.reasons.push("near max position".into());
        }

        result
    }
}
