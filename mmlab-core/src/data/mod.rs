//! Market-data retrieval, caching, and block-range indexing.
//!
//! Layout of the backing source (`data_root`):
//! - `trades/trades_{start}_{end}.parquet` — sequential block-range
//!   partitions (`.csv` accepted per partition as a fallback format)
//! - `markets/markets_*.parquet` — market metadata table
//!
//! Layout of the local cache (`cache_root`):
//! - `trades/{hash}.parquet` — materialized per-market trade sequences
//! - `market_index.json` — market → partition-range index
//! - `markets.parquet` — cached copy of the metadata table
//!
//! Read paths degrade to empty results when the source is unreachable;
//! cache writes are atomic (write-to-temp, rename into place).

pub mod cache;
pub mod convert;
pub mod index;
pub mod partitions;
pub mod schema;
pub mod store;

pub use cache::{CacheStats, TradesCache};
pub use index::MarketIndex;
pub use partitions::PartitionFile;
pub use schema::{validate_trade_table, RawTrade};
pub use store::{MarketDataStore, TimeRange};

use thiserror::Error;

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("csv I/O error: {0}")]
    Csv(String),

    #[error("validation error: {0}")]
    Validation(String),
}
