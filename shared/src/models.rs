use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One OHLCV observation, timestamped in the market's reference timezone.
///
/// `high >= max(open, close)` and `low <= min(open, close)` are expected but not checked;
/// upstream values are passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Tz>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Nominal lookback requested from the data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "1w")]
    OneWeek,
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    pub const ALL: [Period; 6] = [
        Period::OneDay,
        Period::OneWeek,
        Period::OneMonth,
        Period::ThreeMonths,
        Period::OneYear,
        Period::Max,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::OneDay => "1d",
            Period::OneWeek => "1w",
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::OneYear => "1y",
            Period::Max => "max",
        }
    }

    /// Sampling interval used when the caller does not pick one.
    pub fn default_interval(&self) -> &'static str {
        match self {
            Period::OneDay => "5m",
            Period::OneWeek => "30m",
            Period::OneMonth | Period::ThreeMonths => "1d",
            Period::OneYear | Period::Max => "1wk",
        }
    }

    /// Calendar span covered by the period. `None` means the full available history.
    pub fn lookback(&self) -> Option<Duration> {
        match self {
            Period::OneDay => Some(Duration::days(1)),
            Period::OneWeek => Some(Duration::days(7)),
            Period::OneMonth => Some(Duration::days(30)),
            Period::ThreeMonths => Some(Duration::days(91)),
            Period::OneYear => Some(Duration::days(365)),
            Period::Max => None,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown period '{0}'. Use one of 1d, 1w, 1mo, 3mo, 1y, max.")]
pub struct ParsePeriodError(pub String);

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1d" => Ok(Period::OneDay),
            "1w" => Ok(Period::OneWeek),
            "1mo" => Ok(Period::OneMonth),
            "3mo" => Ok(Period::ThreeMonths),
            "1y" => Ok(Period::OneYear),
            "max" => Ok(Period::Max),
            _ => Err(ParsePeriodError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("Bar timestamps must be strictly increasing (violated at position {position})")]
    NotIncreasing { position: usize },

    #[error("Indicator column '{name}' has {actual} values but the series has {expected} bars")]
    ColumnLength {
        name: String,
        expected: usize,
        actual: usize,
    },
}

/// Chronologically ordered bars for one symbol, period and interval.
///
/// Built once (normally by the quote normalizer) and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    symbol: String,
    period: Period,
    interval: String,
    bars: Vec<PriceBar>,
}

impl BarSeries {
    pub fn new(
        symbol: impl Into<String>,
        period: Period,
        interval: impl Into<String>,
        bars: Vec<PriceBar>,
    ) -> Result<Self, SeriesError> {
        if let Some(position) = bars
            .windows(2)
            .position(|pair| pair[1].timestamp <= pair[0].timestamp)
        {
            return Err(SeriesError::NotIncreasing { position: position + 1 });
        }
        Ok(Self {
            symbol: symbol.into(),
            period,
            interval: interval.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.bars.iter().map(|bar| bar.close)
    }
}

/// Indicator columns aligned by position with the `BarSeries` they were computed from.
///
/// Values are `None` during an indicator's warm-up. Always zip with the bars by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSeries {
    bar_count: usize,
    columns: IndexMap<String, Vec<Option<f64>>>,
}

impl IndicatorSeries {
    pub fn new(bar_count: usize) -> Self {
        Self {
            bar_count,
            columns: IndexMap::new(),
        }
    }

    /// Adds a column. A column whose length differs from the bar count is rejected.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Result<(), SeriesError> {
        let name = name.into();
        if values.len() != self.bar_count {
            return Err(SeriesError::ColumnLength {
                name,
                expected: self.bar_count,
                actual: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Number of bar positions every column covers.
    pub fn len(&self) -> usize {
        self.bar_count
    }

    pub fn is_empty(&self) -> bool {
        self.bar_count == 0
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Value of `name` at the final bar position.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(|v| v.last().copied().flatten())
    }

    /// All indicator values at bar position `index`, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<(&str, Option<f64>)>> {
        if index >= self.bar_count {
            return None;
        }
        Some(
            self.columns
                .iter()
                .map(|(name, values)| (name.as_str(), values[index]))
                .collect(),
        )
    }
}

/// Summary statistics of a `BarSeries`, in a single currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub last: f64,
    pub first: f64,
    pub high: f64,
    pub low: f64,
    pub change: f64,
    pub change_percent: f64,
    /// Share count; never currency-converted.
    pub total_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DualMetrics {
    pub usd: Metrics,
    pub idr: Metrics,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    Live,
    Cached,
    Fallback,
}

/// The USD to IDR rate used for one analysis, with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate: f64,
    pub source: RateSource,
    pub as_of: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;

    fn bar(minute: u32, close: f64) -> PriceBar {
        PriceBar {
            timestamp: New_York.with_ymd_and_hms(2024, 5, 1, 10, minute, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100.0,
        }
    }

    #[test]
    fn test_period_round_trips_through_str() {
        for period in Period::ALL {
            assert_eq!(period.as_str().parse::<Period>().unwrap(), period);
        }
        assert_eq!(" 1MO ".parse::<Period>().unwrap(), Period::OneMonth);
        assert!("2y".parse::<Period>().is_err());
        // Interval strings are not period names.
        assert!("1wk".parse::<Period>().is_err());
        assert!("7d".parse::<Period>().is_err());
    }

    #[test]
    fn test_period_default_intervals() {
        assert_eq!(Period::OneDay.default_interval(), "5m");
        assert_eq!(Period::OneWeek.default_interval(), "30m");
        assert_eq!(Period::ThreeMonths.default_interval(), "1d");
        assert_eq!(Period::Max.default_interval(), "1wk");
        assert_eq!(Period::OneWeek.lookback(), Some(Duration::days(7)));
        assert_eq!(Period::Max.lookback(), None);
    }

    #[test]
    fn test_bar_series_rejects_unordered_bars() {
        let err = BarSeries::new("AAPL", Period::OneDay, "5m", vec![bar(5, 1.0), bar(0, 2.0)])
            .unwrap_err();
        assert_eq!(err, SeriesError::NotIncreasing { position: 1 });

        let dup = BarSeries::new("AAPL", Period::OneDay, "5m", vec![bar(5, 1.0), bar(5, 2.0)]);
        assert!(dup.is_err());
    }

    #[test]
    fn test_bar_series_accessors() {
        let series =
            BarSeries::new("AAPL", Period::OneDay, "5m", vec![bar(0, 1.0), bar(5, 2.0)]).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes().collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(series.first().unwrap().close, 1.0);
        assert_eq!(series.last().unwrap().close, 2.0);
        assert_eq!(series.interval(), "5m");
    }

    #[test]
    fn test_indicator_series_rows_are_positional() {
        let mut indicators = IndicatorSeries::new(3);
        indicators.insert("SMA_2", vec![None, Some(1.5), Some(2.5)]).unwrap();
        indicators.insert("RSI_2", vec![None, None, Some(100.0)]).unwrap();

        assert_eq!(indicators.names().collect::<Vec<_>>(), vec!["SMA_2", "RSI_2"]);
        assert_eq!(indicators.row(1).unwrap(), vec![("SMA_2", Some(1.5)), ("RSI_2", None)]);
        assert_eq!(indicators.latest("RSI_2"), Some(100.0));
        assert!(indicators.row(3).is_none());
    }

    #[test]
    fn test_indicator_series_rejects_misaligned_column() {
        let mut indicators = IndicatorSeries::new(3);
        let err = indicators.insert("SMA_2", vec![None, Some(1.5)]).unwrap_err();
        assert_eq!(
            err,
            SeriesError::ColumnLength {
                name: "SMA_2".to_string(),
                expected: 3,
                actual: 2,
            }
        );
        assert_eq!(indicators.column_count(), 0);
        assert!(indicators.get("SMA_2").is_none());
    }
}
