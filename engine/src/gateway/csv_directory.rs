// Offline provider backed by a directory of Yahoo-style CSV exports.
//
// Bars for `AAPL` over `1mo` are read from `AAPL_1mo.csv` as-is. Without that file,
// `AAPL.csv` is cut down to the period's lookback, counted back from its newest row.
// The USD/IDR rate is the last close found in `IDR=X.csv`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use shared::models::Period;

use super::{FetchGateway, GatewayError, RateObservation};
use crate::data::csv_parser::YahooCsvParser;
use crate::data::{QuoteNormalizer, RawQuoteTable};

pub const DEFAULT_RATE_SYMBOL: &str = "IDR=X";

#[derive(Debug, Clone)]
pub struct CsvDirectoryGateway {
    root: PathBuf,
    rate_symbol: String,
}

impl CsvDirectoryGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            rate_symbol: DEFAULT_RATE_SYMBOL.to_string(),
        }
    }

    pub fn with_rate_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.rate_symbol = symbol.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Symbols with path components never resolve to a file. The flag marks the
    // full-history file that still needs windowing.
    fn candidate_files(&self, symbol: &str, period: Period) -> Vec<(PathBuf, bool)> {
        if symbol.is_empty() || symbol.contains(|c: char| c == '/' || c == '\\') || symbol.contains("..") {
            return Vec::new();
        }
        vec![
            (self.root.join(format!("{}_{}.csv", symbol, period)), false),
            (self.root.join(format!("{}.csv", symbol)), true),
        ]
    }

    async fn read_table(&self, symbol: &str, period: Period) -> Result<Option<RawQuoteTable>, GatewayError> {
        for (path, full_history) in self.candidate_files(symbol, period) {
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(GatewayError::Unavailable(format!(
                        "Failed to read '{}': {}",
                        path.display(),
                        e
                    )))
                }
            };
            tracing::debug!(symbol, path = %path.display(), bytes = bytes.len(), "Reading quote file");
            let table = YahooCsvParser::parse_reader(bytes.as_slice()).map_err(|e| GatewayError::Malformed {
                symbol: symbol.to_string(),
                detail: format!("{}: {:#}", path.display(), e),
            })?;
            let table = match period.lookback() {
                Some(lookback) if full_history => {
                    let window = table.trailing_window(lookback);
                    tracing::debug!(symbol, %period, rows = table.row_count(), kept = window.row_count(), "Windowed full-history file");
                    window
                }
                _ => table,
            };
            return Ok(Some(table));
        }
        Ok(None)
    }
}

#[async_trait]
impl FetchGateway for CsvDirectoryGateway {
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: &str,
    ) -> Result<RawQuoteTable, GatewayError> {
        match self.read_table(symbol, period).await? {
            Some(table) => Ok(table),
            None => {
                tracing::debug!(symbol, %period, interval, root = %self.root.display(), "No quote file found");
                Ok(RawQuoteTable::empty())
            }
        }
    }

    async fn fetch_usd_idr_rate(&self) -> Option<RateObservation> {
        let table = match self.read_table(&self.rate_symbol, Period::OneDay).await {
            Ok(Some(table)) => table,
            Ok(None) => {
                tracing::debug!(symbol = %self.rate_symbol, "No rate file found");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read USD/IDR rate file");
                return None;
            }
        };

        let interval = Period::OneDay.default_interval();
        let series = match QuoteNormalizer::default().normalize(&table, &self.rate_symbol, Period::OneDay, interval) {
            Ok(series) => series,
            Err(e) => {
                tracing::warn!(error = %e, "USD/IDR rate file has no usable rows");
                return None;
            }
        };
        let last = series.last()?;
        Some(RateObservation {
            rate: last.close,
            observed_at: last.timestamp.with_timezone(&Utc),
            from_cache: false,
        })
    }
}
