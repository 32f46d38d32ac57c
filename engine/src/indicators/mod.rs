// Technical indicators module
pub mod ema;
pub mod rsi;
pub mod sma;

pub use ema::Ema;
pub use rsi::Rsi;
pub use sma::Sma;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::models::{BarSeries, IndicatorSeries, PriceBar};
use tracing::debug;

use crate::error::{AnalysisError, Result};

// Common trait for all indicators
pub trait IndicatorCalculator: Send + Sync {
    fn name(&self) -> &str;
    fn parameters(&self) -> Value; // Parameters used for this indicator instance
    /// One entry per bar; `None` until the indicator has enough history.
    fn calculate(&self, data: &[PriceBar]) -> Vec<Option<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorKind {
    Sma,
    Ema,
    Rsi,
}

impl IndicatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Rsi => "RSI",
        }
    }
}

/// One requested indicator column, e.g. SMA over 20 bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndicatorSpec {
    kind: IndicatorKind,
    window: usize,
}

impl IndicatorSpec {
    pub fn new(kind: IndicatorKind, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(AnalysisError::InvalidIndicatorWindow);
        }
        Ok(Self { kind, window })
    }

    pub fn kind(&self) -> IndicatorKind {
        self.kind
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Column name in the resulting [`IndicatorSeries`], e.g. `SMA_20`.
    pub fn name(&self) -> String {
        format!("{}_{}", self.kind.as_str(), self.window)
    }

    pub fn calculator(&self) -> Box<dyn IndicatorCalculator> {
        match self.kind {
            IndicatorKind::Sma => Box::new(Sma::new(self.window)),
            IndicatorKind::Ema => Box::new(Ema::new(self.window)),
            IndicatorKind::Rsi => Box::new(Rsi::new(self.window)),
        }
    }

    /// SMA 20/50, EMA 20/50 and RSI 14.
    pub fn defaults() -> Vec<IndicatorSpec> {
        [
            (IndicatorKind::Sma, 20),
            (IndicatorKind::Sma, 50),
            (IndicatorKind::Ema, 20),
            (IndicatorKind::Ema, 50),
            (IndicatorKind::Rsi, 14),
        ]
        .into_iter()
        .map(|(kind, window)| IndicatorSpec { kind, window })
        .collect()
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind.as_str(), self.window)
    }
}

/// Accepts `SMA_20`, `sma:20`, `ema-50` or a bare `RSI` (window 14).
impl FromStr for IndicatorSpec {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let separator = |c: char| matches!(c, '_' | ':' | '-' | ' ');
        let (kind_part, window_part) = match trimmed.find(separator) {
            Some(pos) => (&trimmed[..pos], Some(trimmed[pos + 1..].trim())),
            None => (trimmed, None),
        };
        let kind = match kind_part.to_lowercase().as_str() {
            "sma" => IndicatorKind::Sma,
            "ema" => IndicatorKind::Ema,
            "rsi" => IndicatorKind::Rsi,
            _ => return Err(AnalysisError::UnknownIndicator(s.to_string())),
        };
        let window = match (window_part, kind) {
            (Some(w), _) => w
                .parse::<usize>()
                .map_err(|_| AnalysisError::UnknownIndicator(s.to_string()))?,
            (None, IndicatorKind::Rsi) => 14,
            (None, _) => return Err(AnalysisError::UnknownIndicator(s.to_string())),
        };
        IndicatorSpec::new(kind, window)
    }
}

impl Serialize for IndicatorSpec {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IndicatorSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Runs every requested indicator over the closes of `series`.
///
/// Columns come back in request order; a spec listed twice is computed once.
/// Windows longer than the series give an all-`None` column.
pub fn compute(series: &BarSeries, specs: &[IndicatorSpec]) -> Result<IndicatorSeries> {
    if series.is_empty() {
        return Err(AnalysisError::InsufficientData);
    }

    let mut indicators = IndicatorSeries::new(series.len());
    for spec in specs {
        let name = spec.name();
        if indicators.contains(&name) {
            continue;
        }
        let calculator = spec.calculator();
        let values = calculator.calculate(series.bars());
        debug!(
            symbol = %series.symbol(),
            indicator = %name,
            parameters = %calculator.parameters(),
            warm = values.iter().filter(|v| v.is_some()).count(),
            "Indicator computed"
        );
        indicators.insert(name, values)?;
    }
    Ok(indicators)
}

#[cfg(test)]
pub(crate) fn test_bars(closes: &[f64]) -> Vec<PriceBar> {
    use chrono::{Duration, TimeZone};
    let start = chrono_tz::America::New_York
        .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: start + Duration::minutes(5 * i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        })
        .collect()
}
