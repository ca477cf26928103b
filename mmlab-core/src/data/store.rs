//! MarketDataStore — retrieval and local caching of per-market trade
//! sequences, backed by a block-partitioned file source.
//!
//! Cache-miss reads resolve applicable partitions through the persisted
//! market index (full scan fallback for unindexed markets), filter each
//! partition for the market's outcome tokens on both trade sides, merge in
//! block order, and persist the result atomically. Unreachable sources
//! degrade to empty results; unreadable partitions are skipped and logged.

use super::cache::{CacheStats, TradesCache};
use super::index::MarketIndex;
use super::partitions::{scan_partitions, PartitionFile};
use super::schema::{self, RawTrade};
use super::DataError;
use crate::domain::market::{parse_token_ids, MarketInfo};
use chrono::NaiveDateTime;
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Inclusive time filter applied after retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl TimeRange {
    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if ts < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if ts > end {
                return false;
            }
        }
        true
    }
}

/// Store over a partitioned trade source with a local materialized cache.
pub struct MarketDataStore {
    data_root: PathBuf,
    cache: TradesCache,
    markets: Option<Vec<MarketInfo>>,
    index: Option<MarketIndex>,
}

impl MarketDataStore {
    pub fn new(data_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            cache: TradesCache::new(cache_root),
            markets: None,
            index: None,
        }
    }

    fn trades_dir(&self) -> PathBuf {
        self.data_root.join("trades")
    }

    fn markets_dir(&self) -> PathBuf {
        self.data_root.join("markets")
    }

    /// Ordered trade rows for one market, optionally time-filtered.
    ///
    /// Never errors on an unreachable source — the read path degrades to an
    /// empty result and logs the reason.
    pub fn get_trades(
        &mut self,
        market_id: &str,
        range: Option<TimeRange>,
    ) -> Result<Vec<RawTrade>, DataError> {
        if let Some(rows) = self.cache.load(market_id) {
            debug!(market_id, rows = rows.len(), "trades cache hit");
            return Ok(filter_by_time(rows, range));
        }

        let token_ids = self.token_ids_for_market(market_id);
        if token_ids.is_empty() {
            warn!(market_id, "no outcome tokens known for market");
            return Ok(Vec::new());
        }

        let partitions = scan_partitions(&self.trades_dir());
        if partitions.is_empty() {
            warn!(market_id, dir = %self.trades_dir().display(), "no trade partitions available");
            return Ok(Vec::new());
        }

        let indexed_ranges = self
            .market_index(&partitions)
            .ranges_for(market_id)
            .map(|r| r.to_vec());
        let selected: Vec<&PartitionFile> = match &indexed_ranges {
            Some(ranges) => partitions
                .iter()
                .filter(|p| ranges.contains(&p.range()))
                .collect(),
            None => {
                info!(market_id, "market not indexed, falling back to full scan");
                partitions.iter().collect()
            }
        };

        let mut all: Vec<RawTrade> = Vec::new();
        let mut skipped = 0usize;
        for partition in selected {
            match schema::read_partition(&partition.path) {
                Ok(rows) => {
                    // An instrument may sit on either side of a
                    // partition-local trade.
                    all.extend(rows.into_iter().filter(|row| {
                        token_ids.iter().any(|tid| {
                            *tid == row.maker_asset_id || *tid == row.taker_asset_id
                        })
                    }));
                }
                Err(e) => {
                    skipped += 1;
                    warn!(
                        market_id,
                        partition = %partition.path.display(),
                        error = %e,
                        "skipping unreadable partition, continuing with partial data"
                    );
                }
            }
        }

        all.sort_by_key(|row| row.block_number);
        info!(
            market_id,
            rows = all.len(),
            skipped_partitions = skipped,
            "assembled trades from source"
        );

        if !all.is_empty() {
            if let Err(e) = self.cache.store(market_id, &all) {
                // Not fatal; the result is recomputed on the next call.
                warn!(market_id, error = %e, "failed to persist trades cache");
            }
        }

        Ok(filter_by_time(all, range))
    }

    /// Metadata for one market, if present in the markets table.
    pub fn get_market_info(&mut self, market_id: &str) -> Option<MarketInfo> {
        self.load_markets()
            .iter()
            .find(|m| m.condition_id == market_id)
            .cloned()
    }

    fn token_ids_for_market(&mut self, market_id: &str) -> Vec<String> {
        self.get_market_info(market_id)
            .map(|info| info.outcome_token_ids)
            .unwrap_or_default()
    }

    /// The markets table, loaded once per store (cache copy preferred).
    pub fn load_markets(&mut self) -> &[MarketInfo] {
        if self.markets.is_none() {
            let markets = if let Some(df) = self.cache.load_markets() {
                debug!("markets metadata loaded from cache");
                markets_from_dataframe(&df)
            } else {
                self.load_markets_from_source()
            };
            self.markets = Some(markets);
        }
        self.markets.as_deref().unwrap_or(&[])
    }

    fn load_markets_from_source(&self) -> Vec<MarketInfo> {
        let dir = self.markets_dir();
        let mut combined: Option<DataFrame> = None;

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "markets directory unreadable");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("markets_") && n.ends_with(".parquet"))
            })
            .collect();
        paths.sort();

        for path in paths {
            let df = match read_markets_file(&path) {
                Ok(df) => df,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable markets file");
                    continue;
                }
            };
            combined = match combined {
                Some(acc) => match acc.vstack(&df) {
                    Ok(stacked) => Some(stacked),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "markets file schema mismatch, skipping");
                        Some(acc)
                    }
                },
                None => Some(df),
            };
        }

        match combined {
            Some(df) => {
                if let Err(e) = self.cache.store_markets(&df) {
                    warn!(error = %e, "failed to cache markets metadata");
                }
                let markets = markets_from_dataframe(&df);
                info!(markets = markets.len(), "markets metadata loaded from source");
                markets
            }
            None => {
                warn!(dir = %dir.display(), "no markets metadata found");
                Vec::new()
            }
        }
    }

    fn market_index(&mut self, partitions: &[PartitionFile]) -> &MarketIndex {
        if self.index.is_none() {
            let index = MarketIndex::load(&self.cache.index_path()).unwrap_or_else(|| {
                let markets = self.load_markets().to_vec();
                let index = MarketIndex::build(&markets, partitions);
                if let Err(e) = index.save(&self.cache.index_path()) {
                    warn!(error = %e, "failed to persist market index");
                }
                index
            });
            self.index = Some(index);
        }
        self.index.as_ref().unwrap()
    }

    /// Drop every cached artifact and reset in-memory state; subsequent
    /// calls rebuild from the source.
    pub fn clear_cache(&mut self) {
        info!("clearing market-data cache");
        self.cache.clear();
        self.markets = None;
        self.index = None;
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

fn filter_by_time(rows: Vec<RawTrade>, range: Option<TimeRange>) -> Vec<RawTrade> {
    let Some(range) = range else { return rows };
    if range == TimeRange::default() {
        return rows;
    }
    rows.into_iter()
        .filter(|row| {
            let ts = row
                .timestamp
                .or_else(|| schema::epoch_to_datetime(row.block_number as i64));
            match ts {
                Some(ts) => range.contains(ts),
                None => false,
            }
        })
        .collect()
}

fn read_markets_file(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))
}

/// Parse the metadata table leniently: only `condition_id` is required,
/// everything else falls back to a sensible default.
pub fn markets_from_dataframe(df: &DataFrame) -> Vec<MarketInfo> {
    let ids = match df.column("condition_id").and_then(|c| c.str().cloned()) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(error = %e, "markets table missing condition_id column");
            return Vec::new();
        }
    };
    let questions = df.column("question").and_then(|c| c.str().cloned()).ok();
    let categories = df.column("category").and_then(|c| c.str().cloned()).ok();
    let token_lists = df
        .column("outcome_token_ids")
        .and_then(|c| c.str().cloned())
        .ok();
    let tick_sizes = df
        .column("tick_size")
        .and_then(|c| c.cast(&DataType::Float64))
        .and_then(|c| c.f64().cloned())
        .ok();
    let volumes = df
        .column("volume")
        .and_then(|c| c.cast(&DataType::Float64))
        .and_then(|c| c.f64().cloned())
        .ok();

    let mut markets = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(condition_id) = ids.get(i) else {
            continue;
        };
        markets.push(MarketInfo {
            condition_id: condition_id.to_string(),
            question: questions
                .as_ref()
                .and_then(|c| c.get(i))
                .unwrap_or_default()
                .to_string(),
            category: categories
                .as_ref()
                .and_then(|c| c.get(i))
                .unwrap_or_default()
                .to_string(),
            outcome_token_ids: token_lists
                .as_ref()
                .and_then(|c| c.get(i))
                .map(parse_token_ids)
                .unwrap_or_default(),
            tick_size: tick_sizes
                .as_ref()
                .and_then(|c| c.get(i))
                .unwrap_or(MarketInfo::DEFAULT_TICK_SIZE),
            volume: volumes.as_ref().and_then(|c| c.get(i)).unwrap_or(0.0),
        });
    }
    markets
}

/// Build a markets metadata DataFrame (used by tests and import tooling).
pub fn markets_to_dataframe(markets: &[MarketInfo]) -> Result<DataFrame, DataError> {
    let ids: Vec<String> = markets.iter().map(|m| m.condition_id.clone()).collect();
    let questions: Vec<String> = markets.iter().map(|m| m.question.clone()).collect();
    let categories: Vec<String> = markets.iter().map(|m| m.category.clone()).collect();
    let tokens: Vec<String> = markets
        .iter()
        .map(|m| serde_json::to_string(&m.outcome_token_ids).unwrap_or_else(|_| "[]".into()))
        .collect();
    let ticks: Vec<f64> = markets.iter().map(|m| m.tick_size).collect();
    let volumes: Vec<f64> = markets.iter().map(|m| m.volume).collect();

    DataFrame::new(vec![
        Column::new("condition_id".into(), ids),
        Column::new("question".into(), questions),
        Column::new("category".into(), categories),
        Column::new("outcome_token_ids".into(), tokens),
        Column::new("tick_size".into(), ticks),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}
