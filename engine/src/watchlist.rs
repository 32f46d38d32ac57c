// Intraday quote snapshots for a list of symbols.

use std::sync::Arc;

use serde::Serialize;
use shared::models::{BarSeries, Period};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::data::QuoteNormalizer;
use crate::error::{AnalysisError, Result};
use crate::gateway::FetchGateway;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteSnapshot {
    pub symbol: String,
    /// Latest close.
    pub price: f64,
    /// Open of the first bar of the day.
    pub open: f64,
    pub change: f64,
    pub change_percent: f64,
    pub price_idr: f64,
}

impl QuoteSnapshot {
    fn from_series(series: &BarSeries, rate: f64) -> Result<Self> {
        let (first, last) = match (series.first(), series.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(AnalysisError::EmptyInput),
        };
        let change = last.close - first.open;
        let change_percent = if first.open == 0.0 {
            0.0
        } else {
            change / first.open * 100.0
        };
        Ok(QuoteSnapshot {
            symbol: series.symbol().to_string(),
            price: last.close,
            open: first.open,
            change,
            change_percent,
            price_idr: last.close * rate,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WatchEntry {
    Quote(QuoteSnapshot),
    Unavailable { symbol: String, reason: String },
}

impl WatchEntry {
    pub fn symbol(&self) -> &str {
        match self {
            WatchEntry::Quote(quote) => &quote.symbol,
            WatchEntry::Unavailable { symbol, .. } => symbol,
        }
    }
}

async fn fetch_one(gateway: Arc<dyn FetchGateway>, symbol: String, rate: f64) -> Result<QuoteSnapshot> {
    let period = Period::OneDay;
    let interval = period.default_interval();
    let raw = gateway.fetch_bars(&symbol, period, interval).await?;
    let series = match QuoteNormalizer::default().normalize(&raw, &symbol, period, interval) {
        Err(AnalysisError::EmptyInput) => {
            return Err(AnalysisError::NoData { symbol, period });
        }
        other => other?,
    };
    QuoteSnapshot::from_series(&series, rate)
}

/// One entry per requested symbol, in request order.
///
/// Symbols are fetched concurrently. A failing symbol becomes [`WatchEntry::Unavailable`]
/// and does not affect the others.
pub async fn snapshot(gateway: Arc<dyn FetchGateway>, symbols: &[String], rate: f64) -> Result<Vec<WatchEntry>> {
    if !(rate.is_finite() && rate > 0.0) {
        return Err(AnalysisError::InvalidRate(rate));
    }

    let mut tasks = JoinSet::new();
    for (position, symbol) in symbols.iter().enumerate() {
        let gateway = Arc::clone(&gateway);
        let symbol = symbol.trim().to_uppercase();
        tasks.spawn(async move {
            let result = fetch_one(gateway, symbol.clone(), rate).await;
            (position, symbol, result)
        });
    }

    let mut entries: Vec<Option<WatchEntry>> = vec![None; symbols.len()];
    while let Some(joined) = tasks.join_next().await {
        let (position, symbol, result) = match joined {
            Ok(done) => done,
            Err(e) => {
                warn!(error = %e, "Watchlist task did not complete");
                continue;
            }
        };
        let entry = match result {
            Ok(quote) => {
                debug!(symbol = %symbol, price = quote.price, "Watchlist quote");
                WatchEntry::Quote(quote)
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Watchlist symbol unavailable");
                WatchEntry::Unavailable {
                    symbol,
                    reason: e.user_message(),
                }
            }
        };
        entries[position] = Some(entry);
    }

    // A panicked task leaves a hole; report it rather than dropping the symbol.
    Ok(entries
        .into_iter()
        .zip(symbols)
        .map(|(entry, symbol)| {
            entry.unwrap_or_else(|| WatchEntry::Unavailable {
                symbol: symbol.trim().to_uppercase(),
                reason: "Quote lookup was interrupted".to_string(),
            })
        })
        .collect())
}
