//! Strategy and run configuration.

use chrono::NaiveDateTime;
use mmlab_core::risk::RiskGate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read error: {0}")]
    Read(String),

    #[error("config parse error: {0}")]
    Parse(String),
}

/// Plain key/value strategy parameters.
///
/// Serialized as flat TOML so runs are reproducible from a config file;
/// defaults mirror the production strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    /// Stop-loss trigger on unrealized PnL, in percent (negative).
    pub stop_loss_threshold: f64,
    /// Take-profit markup over the average entry price, in percent.
    pub take_profit_threshold: f64,
    /// Rolling volatility level at which new exposure pauses.
    pub volatility_threshold: f64,
    /// Absolute position cap.
    pub max_position_size: f64,
    /// Preferred size per order.
    pub trade_size: f64,
    /// Orders below this size are rejected.
    pub min_size: f64,
    /// Stop-loss only fires while the spread is at most this wide.
    pub spread_threshold: f64,
    /// Cooldown length after a stop-loss, in hours.
    pub sleep_period_hours: i64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            stop_loss_threshold: -5.0,
            take_profit_threshold: 3.0,
            volatility_threshold: 0.15,
            max_position_size: 250.0,
            trade_size: 50.0,
            min_size: 5.0,
            spread_threshold: 0.02,
            sleep_period_hours: 6,
        }
    }
}

impl StrategyParams {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|e| ConfigError::Read(format!("{}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// A risk gate initialized from these parameters, with fresh state.
    pub fn risk_gate(&self) -> RiskGate {
        let mut gate = RiskGate::default();
        gate.stop_loss_threshold = self.stop_loss_threshold;
        gate.take_profit_threshold = self.take_profit_threshold;
        gate.volatility_threshold = self.volatility_threshold;
        gate.max_position = self.max_position_size;
        gate.min_size = self.min_size;
        gate.spread_threshold = self.spread_threshold;
        gate.sleep_period_hours = self.sleep_period_hours;
        gate
    }
}

/// Full configuration for one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub params: StrategyParams,
    pub initial_capital: f64,
    /// Optional time filter applied to the loaded trades.
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            params: StrategyParams::default(),
            initial_capital: 10_000.0,
            start: None,
            end: None,
        }
    }
}
