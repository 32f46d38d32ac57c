// In-memory provider, used by tests and by embedders that already hold their data.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use shared::models::Period;
use tokio::sync::RwLock; // Using tokio's RwLock for async safety

use super::{FetchGateway, GatewayError, RateObservation};
use crate::data::RawQuoteTable;

#[derive(Debug, Default)]
pub struct InMemoryGateway {
    // Keyed by upper-cased symbol and period.
    tables: RwLock<HashMap<(String, Period), RawQuoteTable>>,
    rate: RwLock<Option<f64>>,
    rate_fetches: AtomicUsize,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(rate: f64) -> Self {
        Self {
            rate: RwLock::new(Some(rate)),
            ..Self::default()
        }
    }

    pub async fn insert_table(&self, symbol: &str, period: Period, table: RawQuoteTable) {
        tracing::debug!(symbol, %period, rows = table.row_count(), "Storing quote table");
        self.tables
            .write()
            .await
            .insert((symbol.to_uppercase(), period), table);
    }

    pub async fn set_rate(&self, rate: Option<f64>) {
        *self.rate.write().await = rate;
    }

    /// Number of times the rate has been requested.
    pub fn rate_fetch_count(&self) -> usize {
        self.rate_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchGateway for InMemoryGateway {
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: &str,
    ) -> Result<RawQuoteTable, GatewayError> {
        let tables = self.tables.read().await;
        match tables.get(&(symbol.to_uppercase(), period)) {
            Some(table) => Ok(table.clone()),
            None => {
                tracing::debug!(symbol, %period, interval, "No stored table, returning empty");
                Ok(RawQuoteTable::empty())
            }
        }
    }

    async fn fetch_usd_idr_rate(&self) -> Option<RateObservation> {
        self.rate_fetches.fetch_add(1, Ordering::SeqCst);
        let rate = (*self.rate.read().await)?;
        Some(RateObservation {
            rate,
            observed_at: Utc::now(),
            from_cache: false,
        })
    }
}
