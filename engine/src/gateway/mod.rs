// Boundary to the external market-data and FX providers.
//
// The engine never talks to a provider directly; everything goes through
// `FetchGateway`. Implementations decide about transport, retries and timeouts.
// An unknown symbol is an empty table, never an error.

pub mod csv_directory;
pub mod memory;
pub mod rate_cache;

pub use csv_directory::CsvDirectoryGateway;
pub use memory::InMemoryGateway;
pub use rate_cache::{CachedRateGateway, Clock, ManualClock, SystemClock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::models::Period;
use thiserror::Error;

use crate::data::RawQuoteTable;

/// A USD -> IDR quote as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateObservation {
    /// IDR per one USD.
    pub rate: f64,
    /// When the provider's quote was taken.
    pub observed_at: DateTime<Utc>,
    /// True when served from a memoized earlier fetch.
    pub from_cache: bool,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Malformed data for '{symbol}': {detail}")]
    Malformed { symbol: String, detail: String },

    #[error("Provider request failed: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait FetchGateway: Send + Sync {
    /// Raw OHLCV table for `symbol`. Returns an empty table when the provider has no data.
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: &str,
    ) -> Result<RawQuoteTable, GatewayError>;

    /// Current USD -> IDR rate, or `None` when it cannot be obtained.
    async fn fetch_usd_idr_rate(&self) -> Option<RateObservation>;
}
