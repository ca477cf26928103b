//! Local cache: materialized per-market trade files, the persisted market
//! index, and the metadata table copy.
//!
//! All writes are atomic (write to `.tmp`, rename into place) so concurrent
//! or interrupted writers never leave a partially written file visible.
//! Corrupt cache entries are treated as absent and recomputed.

use super::schema::{self, RawTrade};
use super::DataError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Cache summary reported to callers (`cache stats` in the CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    pub cache_dir: String,
    pub markets_cached: bool,
    pub index_exists: bool,
    pub trades_cached: usize,
    pub total_cache_size_mb: f64,
    pub markets_cache_size_mb: f64,
}

/// Filesystem layout of the local cache.
pub struct TradesCache {
    cache_root: PathBuf,
}

impl TradesCache {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    fn trades_dir(&self) -> PathBuf {
        self.cache_root.join("trades")
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_root.join("market_index.json")
    }

    pub fn markets_path(&self) -> PathBuf {
        self.cache_root.join("markets.parquet")
    }

    /// Stable cache key: truncated blake3 of the market identifier.
    pub fn cache_key(market_id: &str) -> String {
        blake3::hash(market_id.as_bytes()).to_hex()[..16].to_string()
    }

    fn market_path(&self, market_id: &str) -> PathBuf {
        self.trades_dir()
            .join(format!("{}.parquet", Self::cache_key(market_id)))
    }

    pub fn contains(&self, market_id: &str) -> bool {
        self.market_path(market_id).exists()
    }

    /// Persist a market's assembled trade sequence.
    pub fn store(&self, market_id: &str, rows: &[RawTrade]) -> Result<(), DataError> {
        fs::create_dir_all(self.trades_dir())
            .map_err(|e| DataError::Cache(format!("create cache dir: {e}")))?;
        let df = schema::raw_trades_to_dataframe(rows)?;
        write_parquet_atomic(&df, &self.market_path(market_id))
    }

    /// Load a market's cached trade sequence.
    ///
    /// Returns `None` when the entry is absent; a corrupt entry is removed
    /// and also reported as absent so the caller recomputes it.
    pub fn load(&self, market_id: &str) -> Option<Vec<RawTrade>> {
        let path = self.market_path(market_id);
        if !path.exists() {
            return None;
        }
        match read_parquet(&path).and_then(|df| schema::dataframe_to_raw_trades(&df)) {
            Ok(rows) => Some(rows),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt trades cache entry, recomputing");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Persist the metadata table copy.
    pub fn store_markets(&self, df: &DataFrame) -> Result<(), DataError> {
        fs::create_dir_all(&self.cache_root)
            .map_err(|e| DataError::Cache(format!("create cache dir: {e}")))?;
        write_parquet_atomic(df, &self.markets_path())
    }

    /// Load the cached metadata table, treating corruption as a miss.
    pub fn load_markets(&self) -> Option<DataFrame> {
        let path = self.markets_path();
        if !path.exists() {
            return None;
        }
        match read_parquet(&path) {
            Ok(df) => Some(df),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt markets cache, reloading from source");
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    /// Remove every cached artifact.
    pub fn clear(&self) {
        if let Ok(entries) = fs::read_dir(self.trades_dir()) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                    let _ = fs::remove_file(path);
                }
            }
        }
        let _ = fs::remove_file(self.index_path());
        let _ = fs::remove_file(self.markets_path());
    }

    pub fn stats(&self) -> CacheStats {
        let mut trades_cached = 0usize;
        let mut total_bytes = 0u64;

        if let Ok(entries) = fs::read_dir(self.trades_dir()) {
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) == Some("parquet") {
                    trades_cached += 1;
                    total_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        let markets_bytes = fs::metadata(self.markets_path())
            .map(|m| m.len())
            .unwrap_or(0);

        CacheStats {
            cache_dir: self.cache_root.display().to_string(),
            markets_cached: self.markets_path().exists(),
            index_exists: self.index_path().exists(),
            trades_cached,
            total_cache_size_mb: mb(total_bytes),
            markets_cache_size_mb: mb(markets_bytes),
        }
    }
}

fn mb(bytes: u64) -> f64 {
    (bytes as f64 / (1024.0 * 1024.0) * 100.0).round() / 100.0
}

/// Write a DataFrame to `path` atomically.
pub fn write_parquet_atomic(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let tmp_path = path.with_extension("parquet.tmp");
    let file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Parquet(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::Cache(format!("atomic rename failed: {e}"))
    })
}

fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))
}
