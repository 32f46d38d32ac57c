// Untyped quote table as handed over by a fetch gateway.
//
// Providers disagree on shape: a single-symbol download has flat column labels
// (`Close`), a batch download carries a second label level (`("Close", "AAPL")`).
// The table keeps whatever it was given; the normalizer decides what it means.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use shared::models::BarSeries;

/// Column label as exposed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    Flat(String),
    /// Hierarchical label, outermost level first, e.g. `["Close", "AAPL"]`.
    Nested(Vec<String>),
}

impl ColumnKey {
    pub fn flat(label: impl Into<String>) -> Self {
        ColumnKey::Flat(label.into())
    }

    pub fn nested<I, S>(levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnKey::Nested(levels.into_iter().map(Into::into).collect())
    }
}

/// Row index. Naive timestamps carry no zone information.
#[derive(Debug, Clone, PartialEq)]
pub enum RawIndex {
    Naive(Vec<NaiveDateTime>),
    Zoned(Vec<DateTime<FixedOffset>>),
}

impl RawIndex {
    pub fn len(&self) -> usize {
        match self {
            RawIndex::Naive(v) => v.len(),
            RawIndex::Zoned(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row timestamps on the UTC timeline; naive ones are taken as UTC already.
    fn utc_instants(&self) -> Vec<NaiveDateTime> {
        match self {
            RawIndex::Naive(v) => v.clone(),
            RawIndex::Zoned(v) => v.iter().map(|dt| dt.naive_utc()).collect(),
        }
    }

    fn retain_rows(&self, keep: &[bool]) -> RawIndex {
        fn pick<T: Clone>(items: &[T], keep: &[bool]) -> Vec<T> {
            items
                .iter()
                .zip(keep)
                .filter(|(_, k)| **k)
                .map(|(item, _)| item.clone())
                .collect()
        }
        match self {
            RawIndex::Naive(v) => RawIndex::Naive(pick(v, keep)),
            RawIndex::Zoned(v) => RawIndex::Zoned(pick(v, keep)),
        }
    }
}

impl Default for RawIndex {
    fn default() -> Self {
        RawIndex::Naive(Vec::new())
    }
}

/// Column-major table: `values[c][r]` is column `c` at row `r`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuoteTable {
    pub index: RawIndex,
    pub columns: Vec<ColumnKey>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl RawQuoteTable {
    pub fn new(index: RawIndex, columns: Vec<ColumnKey>, values: Vec<Vec<Option<f64>>>) -> Self {
        Self {
            index,
            columns,
            values,
        }
    }

    /// Table with no rows, the uniform answer for an unknown symbol.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Rows strictly newer than `lookback` before the latest timestamp in the table.
    ///
    /// Row order is kept. An empty table stays empty.
    pub fn trailing_window(&self, lookback: Duration) -> RawQuoteTable {
        let instants = self.index.utc_instants();
        let latest = match instants.iter().max() {
            Some(latest) => *latest,
            None => return self.clone(),
        };
        let cutoff = latest - lookback;
        let keep: Vec<bool> = instants.iter().map(|t| *t > cutoff).collect();

        let values = self
            .values
            .iter()
            .map(|column| {
                column
                    .iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| *v)
                    .collect()
            })
            .collect();
        RawQuoteTable {
            index: self.index.retain_rows(&keep),
            columns: self.columns.clone(),
            values,
        }
    }
}

impl From<&BarSeries> for RawQuoteTable {
    fn from(series: &BarSeries) -> Self {
        let bars = series.bars();
        let index = RawIndex::Zoned(bars.iter().map(|b| b.timestamp.fixed_offset()).collect());
        let columns = ["Open", "High", "Low", "Close", "Volume"]
            .into_iter()
            .map(ColumnKey::flat)
            .collect();
        let values = vec![
            bars.iter().map(|b| Some(b.open)).collect(),
            bars.iter().map(|b| Some(b.high)).collect(),
            bars.iter().map(|b| Some(b.low)).collect(),
            bars.iter().map(|b| Some(b.close)).collect(),
            bars.iter().map(|b| Some(b.volume)).collect(),
        ];
        Self {
            index,
            columns,
            values,
        }
    }
}
