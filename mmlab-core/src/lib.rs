//! MMLab Core — engine for the volatility-gated market-making backtester.
//!
//! This crate contains the data-to-decision pipeline:
//! - Domain types (trades, order-book snapshots, positions, market metadata)
//! - Rolling realized-volatility signal over irregular timestamps
//! - Order pricing against order-book depth, inventory, and tick size
//! - Risk gate (stop-loss, take-profit, cooldown, position limits)
//! - Market-data store with block-range indexing and a parquet cache

pub mod data;
pub mod domain;
pub mod pricing;
pub mod risk;
pub mod volatility;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: core types are Send + Sync.
    ///
    /// Runs are single-threaded, but callers (CLI, future workers) hand
    /// results across threads; this breaks the build immediately if a
    /// non-Send handle sneaks into a domain type.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::OrderBookSnapshot>();
        require_sync::<domain::OrderBookSnapshot>();
        require_send::<domain::PositionState>();
        require_sync::<domain::PositionState>();
        require_send::<domain::MarketInfo>();
        require_sync::<domain::MarketInfo>();

        require_send::<pricing::Quote>();
        require_sync::<pricing::Quote>();
        require_send::<risk::RiskGate>();
        require_sync::<risk::RiskGate>();
        require_send::<risk::RiskAssessment>();
        require_sync::<risk::RiskAssessment>();

        require_send::<data::RawTrade>();
        require_sync::<data::RawTrade>();
        require_send::<data::MarketDataStore>();
        require_sync::<data::MarketDataStore>();
        require_send::<data::CacheStats>();
        require_sync::<data::CacheStats>();
    }
}
