// Raw quote table -> canonical `BarSeries`.
//
// Steps, in order: schema detection, OHLCV column selection, timezone conversion to the
// market's reference zone, row cleanup. Rows keep their input order; nothing is resampled
// or gap-filled.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use shared::models::{BarSeries, Period, PriceBar};
use tracing::{debug, warn};

use super::raw_table::{ColumnKey, RawIndex, RawQuoteTable};
use crate::error::{AnalysisError, Result};

/// Canonical field order of the selected columns.
pub const OHLCV_FIELDS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Exchange timezone used when nothing else is configured (US equities).
pub const DEFAULT_MARKET_TIMEZONE: Tz = chrono_tz::America::New_York;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnSchema {
    Flat,
    Hierarchical,
}

#[derive(Debug, Clone, Copy)]
struct ColumnSelection {
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteNormalizer {
    market_timezone: Tz,
}

impl Default for QuoteNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MARKET_TIMEZONE)
    }
}

impl QuoteNormalizer {
    pub fn new(market_timezone: Tz) -> Self {
        Self { market_timezone }
    }

    /// Builds a normalizer from an IANA zone name such as `"America/New_York"`.
    pub fn for_timezone(name: &str) -> Result<Self> {
        let tz: Tz = name
            .parse()
            .map_err(|e| AnalysisError::Config(format!("Unknown market timezone '{}': {}", name, e)))?;
        Ok(Self::new(tz))
    }

    pub fn normalize(
        &self,
        raw: &RawQuoteTable,
        symbol: &str,
        period: Period,
        interval: &str,
    ) -> Result<BarSeries> {
        if raw.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        let schema = detect_schema(raw)?;
        let selection = select_columns(raw)?;
        debug!(
            symbol = %symbol,
            ?schema,
            rows = raw.row_count(),
            dropped_columns = raw.columns.len().saturating_sub(OHLCV_FIELDS.len()),
            "Column schema resolved"
        );

        let timestamps = self.to_market_time(&raw.index);
        let mut bars: Vec<PriceBar> = Vec::with_capacity(timestamps.len());
        let mut skipped = 0usize;

        for (row, timestamp) in timestamps.into_iter().enumerate() {
            let price = |col: usize| raw.values[col][row].filter(|v| v.is_finite());
            let (Some(open), Some(high), Some(low), Some(close)) = (
                price(selection.open),
                price(selection.high),
                price(selection.low),
                price(selection.close),
            ) else {
                debug!(symbol = %symbol, row, %timestamp, "Skipping row with a missing price");
                skipped += 1;
                continue;
            };
            let volume = price(selection.volume).unwrap_or(0.0);

            if let Some(previous) = bars.last() {
                if timestamp == previous.timestamp {
                    warn!(symbol = %symbol, row, %timestamp, "Duplicate timestamp, keeping the first row");
                    continue;
                }
                if timestamp < previous.timestamp {
                    return Err(AnalysisError::UnorderedIndex { position: row });
                }
            }

            bars.push(PriceBar {
                timestamp,
                open,
                high,
                low,
                close,
                volume,
            });
        }

        if skipped > 0 {
            warn!(symbol = %symbol, skipped, kept = bars.len(), "Dropped rows with missing prices");
        }
        if bars.is_empty() {
            return Err(AnalysisError::EmptyInput);
        }

        Ok(BarSeries::new(symbol, period, interval, bars)?)
    }

    /// Naive timestamps are taken as UTC, then everything moves to the market zone.
    fn to_market_time(&self, index: &RawIndex) -> Vec<DateTime<Tz>> {
        match index {
            RawIndex::Naive(stamps) => stamps
                .iter()
                .map(|naive| Utc.from_utc_datetime(naive).with_timezone(&self.market_timezone))
                .collect(),
            RawIndex::Zoned(stamps) => stamps
                .iter()
                .map(|dt| dt.with_timezone(&self.market_timezone))
                .collect(),
        }
    }
}

fn detect_schema(raw: &RawQuoteTable) -> Result<ColumnSchema> {
    if raw.columns.is_empty() {
        return Err(AnalysisError::UnrecognizedSchema("table has no columns".to_string()));
    }
    if raw.values.len() != raw.columns.len() {
        return Err(AnalysisError::UnrecognizedSchema(format!(
            "{} column labels but {} value columns",
            raw.columns.len(),
            raw.values.len()
        )));
    }
    let rows = raw.row_count();
    if let Some(col) = raw.values.iter().position(|c| c.len() != rows) {
        return Err(AnalysisError::UnrecognizedSchema(format!(
            "column {} has {} values but the index has {} rows",
            col,
            raw.values[col].len(),
            rows
        )));
    }

    let flat = raw.columns.iter().filter(|k| matches!(k, ColumnKey::Flat(_))).count();
    if flat == raw.columns.len() {
        return Ok(ColumnSchema::Flat);
    }
    if flat > 0 {
        return Err(AnalysisError::UnrecognizedSchema(
            "mix of flat and hierarchical column labels".to_string(),
        ));
    }
    let shallow = raw
        .columns
        .iter()
        .any(|k| matches!(k, ColumnKey::Nested(levels) if levels.len() < 2));
    if shallow {
        return Err(AnalysisError::UnrecognizedSchema(
            "hierarchical column label with fewer than two levels".to_string(),
        ));
    }
    Ok(ColumnSchema::Hierarchical)
}

/// Field name of a column: the label itself, or the outermost level of a nested label.
fn field_label(key: &ColumnKey) -> &str {
    match key {
        ColumnKey::Flat(label) => label.trim(),
        ColumnKey::Nested(levels) => levels.first().map(|l| l.trim()).unwrap_or(""),
    }
}

/// First column carrying each field wins, so duplicated labels collapse deterministically.
fn select_columns(raw: &RawQuoteTable) -> Result<ColumnSelection> {
    let find = |field: &'static str| {
        raw.columns
            .iter()
            .position(|key| field_label(key).eq_ignore_ascii_case(field))
            .ok_or(AnalysisError::MissingColumn(field))
    };
    Ok(ColumnSelection {
        open: find("Open")?,
        high: find("High")?,
        low: find("Low")?,
        close: find("Close")?,
        volume: find("Volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Timelike};

    fn naive(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn flat_table(closes: &[f64]) -> RawQuoteTable {
        let n = closes.len();
        RawQuoteTable::new(
            RawIndex::Naive((0..n).map(|i| naive(15, i as u32 * 5)).collect()),
            vec![
                ColumnKey::flat("Open"),
                ColumnKey::flat("High"),
                ColumnKey::flat("Low"),
                ColumnKey::flat("Close"),
                ColumnKey::flat("Adj Close"),
                ColumnKey::flat("Volume"),
            ],
            vec![
                closes.iter().map(|c| Some(c - 0.5)).collect(),
                closes.iter().map(|c| Some(c + 1.0)).collect(),
                closes.iter().map(|c| Some(c - 1.0)).collect(),
                closes.iter().map(|c| Some(*c)).collect(),
                closes.iter().map(|c| Some(c * 0.99)).collect(),
                vec![Some(1000.0); n],
            ],
        )
    }

    #[test]
    fn test_flat_table_normalizes_to_market_time() {
        let raw = flat_table(&[100.0, 102.0, 99.0]);
        let series = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "AAPL");
        // 15:00 UTC in January is 10:00 EST.
        let first = &series.bars()[0];
        assert_eq!(first.timestamp.hour(), 10);
        assert_eq!(first.timestamp.timezone(), chrono_tz::America::New_York);
        assert_eq!(first.close, 100.0);
        assert_eq!(first.open, 99.5);
        assert_eq!(first.high, 101.0);
        assert_eq!(first.volume, 1000.0);
    }

    #[test]
    fn test_hierarchical_labels_collapse_to_first_level() {
        let index = RawIndex::Naive(vec![naive(15, 0), naive(15, 5)]);
        let raw = RawQuoteTable::new(
            index,
            vec![
                ColumnKey::nested(["Close", "AAPL"]),
                ColumnKey::nested(["Close", "MSFT"]),
                ColumnKey::nested(["High", "AAPL"]),
                ColumnKey::nested(["Low", "AAPL"]),
                ColumnKey::nested(["Open", "AAPL"]),
                ColumnKey::nested(["Volume", "AAPL"]),
            ],
            vec![
                vec![Some(10.0), Some(11.0)],
                vec![Some(400.0), Some(401.0)],
                vec![Some(12.0), Some(12.0)],
                vec![Some(9.0), Some(9.0)],
                vec![Some(9.5), Some(10.5)],
                vec![Some(5.0), Some(6.0)],
            ],
        );
        let series = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap();

        assert_eq!(series.closes().collect::<Vec<_>>(), vec![10.0, 11.0]);
        assert_eq!(series.bars()[1].open, 10.5);
        assert_eq!(series.bars()[1].volume, 6.0);
    }

    #[test]
    fn test_mixed_labels_are_rejected() {
        let mut raw = flat_table(&[1.0]);
        raw.columns[0] = ColumnKey::nested(["Open", "AAPL"]);
        let err = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnrecognizedSchema(_)));
    }

    #[test]
    fn test_single_level_nested_label_is_rejected() {
        let mut raw = flat_table(&[1.0]);
        raw.columns = raw
            .columns
            .iter()
            .map(|k| ColumnKey::Nested(vec![field_label(k).to_string()]))
            .collect();
        let err = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnrecognizedSchema(_)));
    }

    #[test]
    fn test_missing_column_is_reported() {
        let mut raw = flat_table(&[1.0, 2.0]);
        raw.columns.remove(5);
        raw.values.remove(5);
        let err = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::MissingColumn("Volume")));
    }

    #[test]
    fn test_empty_table_is_empty_input() {
        let err = QuoteNormalizer::default()
            .normalize(&RawQuoteTable::empty(), "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));
    }

    #[test]
    fn test_zoned_index_is_converted() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let mut raw = flat_table(&[1.0]);
        raw.index = RawIndex::Zoned(vec![tokyo.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap()]);
        let series = QuoteNormalizer::default()
            .normalize(&raw, "7203.T", Period::OneDay, "5m")
            .unwrap();
        // 2024-07-02 00:00 +09:00 == 2024-07-01 15:00 UTC == 11:00 EDT.
        assert_eq!(series.bars()[0].timestamp.hour(), 11);
    }

    #[test]
    fn test_rows_with_missing_prices_are_skipped() {
        let mut raw = flat_table(&[100.0, 101.0, 102.0]);
        raw.values[3][1] = None;
        raw.values[5][2] = None;
        let series = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap();
        assert_eq!(series.closes().collect::<Vec<_>>(), vec![100.0, 102.0]);
        assert_eq!(series.bars()[1].volume, 0.0);
    }

    #[test]
    fn test_all_rows_missing_is_empty_input() {
        let mut raw = flat_table(&[100.0, 101.0]);
        raw.values[3] = vec![None, Some(f64::NAN)];
        let err = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::EmptyInput));
    }

    #[test]
    fn test_duplicate_and_unordered_timestamps() {
        let mut raw = flat_table(&[1.0, 2.0, 3.0]);
        raw.index = RawIndex::Naive(vec![naive(15, 0), naive(15, 0), naive(15, 5)]);
        let series = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap();
        assert_eq!(series.closes().collect::<Vec<_>>(), vec![1.0, 3.0]);

        raw.index = RawIndex::Naive(vec![naive(15, 5), naive(15, 10), naive(15, 0)]);
        let err = QuoteNormalizer::default()
            .normalize(&raw, "AAPL", Period::OneDay, "5m")
            .unwrap_err();
        assert!(matches!(err, AnalysisError::UnorderedIndex { position: 2 }));
    }

    #[test]
    fn test_renormalizing_a_series_is_idempotent() {
        let raw = flat_table(&[100.0, 102.0, 99.0, 105.0, 101.0]);
        let normalizer = QuoteNormalizer::default();
        let once = normalizer.normalize(&raw, "AAPL", Period::OneDay, "5m").unwrap();
        let twice = normalizer
            .normalize(&RawQuoteTable::from(&once), "AAPL", Period::OneDay, "5m")
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_unknown_timezone_is_config_error() {
        assert!(QuoteNormalizer::for_timezone("Asia/Jakarta").is_ok());
        assert!(matches!(
            QuoteNormalizer::for_timezone("Mars/Olympus"),
            Err(AnalysisError::Config(_))
        ));
    }
}
