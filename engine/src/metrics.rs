// Summary statistics over a bar series.

use serde::{Deserialize, Serialize};
use shared::models::{BarSeries, Metrics};
use tracing::warn;

use crate::error::{AnalysisError, Result};

/// What `change_percent` becomes when the first close is exactly zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroBaselinePolicy {
    /// Report 0% and log a warning.
    #[default]
    ReportZero,
    /// Fail with [`AnalysisError::DivisionByZero`].
    Fail,
}

/// [`summarize_with`] using [`ZeroBaselinePolicy::ReportZero`].
pub fn summarize(series: &BarSeries) -> Result<Metrics> {
    summarize_with(series, ZeroBaselinePolicy::default())
}

pub fn summarize_with(series: &BarSeries, policy: ZeroBaselinePolicy) -> Result<Metrics> {
    let bars = series.bars();
    let (first_bar, last_bar) = match (bars.first(), bars.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(AnalysisError::EmptyInput),
    };

    let (high, low, total_volume) = bars.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY, 0.0),
        |(high, low, volume), bar| (high.max(bar.high), low.min(bar.low), volume + bar.volume),
    );

    let first = first_bar.close;
    let last = last_bar.close;
    let change = last - first;
    let change_percent = if first == 0.0 {
        match policy {
            ZeroBaselinePolicy::ReportZero => {
                warn!(symbol = %series.symbol(), "First close is zero, reporting 0% change");
                0.0
            }
            ZeroBaselinePolicy::Fail => return Err(AnalysisError::DivisionByZero),
        }
    } else {
        change / first * 100.0
    };

    Ok(Metrics {
        last,
        first,
        high,
        low,
        change,
        change_percent,
        total_volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_bars;
    use shared::models::{Period, PriceBar};

    fn series_from(bars: Vec<PriceBar>) -> BarSeries {
        BarSeries::new("AAPL", Period::OneMonth, "1d", bars).unwrap()
    }

    #[test]
    fn test_summarize_reference_example() {
        let series = series_from(test_bars(&[100.0, 102.0, 99.0, 105.0, 101.0]));
        let m = summarize(&series).unwrap();

        assert_eq!(m.last, 101.0);
        assert_eq!(m.first, 100.0);
        assert_eq!(m.change, 1.0);
        assert!((m.change_percent - 1.0).abs() < 1e-12);
        // test_bars puts high one above and low one below each close.
        assert_eq!(m.high, 106.0);
        assert_eq!(m.low, 98.0);
        assert_eq!(m.total_volume, 5_000.0);
    }

    #[test]
    fn test_summarize_bounds_hold() {
        let series = series_from(test_bars(&[10.0, 12.5, 7.25, 9.0, 11.0, 8.5]));
        let m = summarize(&series).unwrap();
        assert!(m.low <= m.first && m.first <= m.high);
        assert!(m.low <= m.last && m.last <= m.high);
        assert!(m.high >= m.low);
    }

    #[test]
    fn test_summarize_single_bar() {
        let series = series_from(test_bars(&[42.0]));
        let m = summarize(&series).unwrap();
        assert_eq!(m.first, m.last);
        assert_eq!(m.change, 0.0);
        assert_eq!(m.change_percent, 0.0);
    }

    #[test]
    fn test_summarize_empty_series() {
        let series = series_from(Vec::new());
        assert!(matches!(summarize(&series), Err(AnalysisError::EmptyInput)));
    }

    #[test]
    fn test_zero_baseline_policies() {
        let mut bars = test_bars(&[0.0, 5.0]);
        bars[0].low = 0.0;
        let series = series_from(bars);

        let m = summarize_with(&series, ZeroBaselinePolicy::ReportZero).unwrap();
        assert_eq!(m.change, 5.0);
        assert_eq!(m.change_percent, 0.0);

        assert!(matches!(
            summarize_with(&series, ZeroBaselinePolicy::Fail),
            Err(AnalysisError::DivisionByZero)
        ));
    }

    #[test]
    fn test_policy_deserializes_snake_case() {
        let policy: ZeroBaselinePolicy = serde_json::from_str("\"fail\"").unwrap();
        assert_eq!(policy, ZeroBaselinePolicy::Fail);
    }
}
