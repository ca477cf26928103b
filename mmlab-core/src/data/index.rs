//! Market → partition-range index.
//!
//! Built once by sampling the partitioned source, persisted as JSON, and
//! used to avoid full partition scans on cache misses. The build is
//! bounded to a sampled subset of markets and partitions; an unindexed
//! market falls back to a full scan, so the index is a latency
//! optimization, not a correctness requirement.

use super::partitions::PartitionFile;
use super::schema;
use crate::domain::MarketInfo;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Upper bound on markets indexed per build.
pub const INDEX_MARKET_SAMPLE: usize = 100;

/// Upper bound on partitions scanned per build.
pub const INDEX_PARTITION_SAMPLE: usize = 20;

/// Ordered block ranges known to contain each market's trades.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketIndex {
    pub markets: BTreeMap<String, Vec<(u64, u64)>>,
}

impl MarketIndex {
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }

    pub fn ranges_for(&self, market_id: &str) -> Option<&[(u64, u64)]> {
        self.markets.get(market_id).map(|v| v.as_slice())
    }

    /// Build the index by scanning a bounded sample of partitions once and
    /// intersecting each partition's distinct instrument ids with each
    /// sampled market's outcome tokens. Both sides of a trade are checked —
    /// an instrument can appear as maker or taker.
    pub fn build(markets: &[MarketInfo], partitions: &[PartitionFile]) -> Self {
        let sampled_markets = &markets[..markets.len().min(INDEX_MARKET_SAMPLE)];
        let sampled_partitions = &partitions[..partitions.len().min(INDEX_PARTITION_SAMPLE)];

        let mut partition_tokens: Vec<((u64, u64), HashSet<String>)> =
            Vec::with_capacity(sampled_partitions.len());
        for partition in sampled_partitions {
            match schema::read_partition(&partition.path) {
                Ok(rows) => {
                    let mut tokens = HashSet::new();
                    for row in rows {
                        tokens.insert(row.maker_asset_id);
                        tokens.insert(row.taker_asset_id);
                    }
                    partition_tokens.push((partition.range(), tokens));
                }
                Err(e) => {
                    warn!(
                        partition = %partition.path.display(),
                        error = %e,
                        "skipping unreadable partition during index build"
                    );
                }
            }
        }

        let mut index = MarketIndex::default();
        for market in sampled_markets {
            if market.outcome_token_ids.is_empty() {
                continue;
            }
            let ranges: Vec<(u64, u64)> = partition_tokens
                .iter()
                .filter(|(_, tokens)| {
                    market
                        .outcome_token_ids
                        .iter()
                        .any(|tid| tokens.contains(tid))
                })
                .map(|(range, _)| *range)
                .collect();
            if !ranges.is_empty() {
                index.markets.insert(market.condition_id.clone(), ranges);
            }
        }

        info!(
            markets = index.markets.len(),
            partitions = partition_tokens.len(),
            "market index built"
        );
        index
    }

    /// Load a persisted index; corrupt or missing files count as absent so
    /// the caller rebuilds.
    pub fn load(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt market index, rebuilding");
                let _ = fs::remove_file(path);
                None
            }
        }
    }

    /// Persist atomically (write to temp, rename into place).
    pub fn save(&self, path: &Path) -> Result<(), super::DataError> {
        let json = serde_json::to_string(self)
            .map_err(|e| super::DataError::Cache(format!("index serialization: {e}")))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| super::DataError::Cache(format!("index write: {e}")))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            super::DataError::Cache(format!("index rename: {e}"))
        })
    }
}
