//! Market metadata as exposed by the markets table.

use serde::{Deserialize, Serialize};

/// One row of the market metadata table.
///
/// `outcome_token_ids` arrives JSON-encoded in the source table; it is
/// parsed leniently — an unparsable field yields an empty list rather than
/// an error, since metadata quality varies across markets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub condition_id: String,
    pub question: String,
    pub category: String,
    pub outcome_token_ids: Vec<String>,
    pub tick_size: f64,
    pub volume: f64,
}

impl MarketInfo {
    /// Default tick for markets whose metadata omits one.
    pub const DEFAULT_TICK_SIZE: f64 = 0.01;
}

/// Parse a JSON-encoded token-id list, tolerating junk.
///
/// Accepts `["a","b"]` as well as numeric entries, which are stringified.
pub fn parse_token_ids(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
        Ok(values) => values
            .into_iter()
            .map(|v| match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            })
            .collect(),
        Err(_) => Vec::new(),
    }
}
