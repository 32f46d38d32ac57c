// The end-to-end analysis pipeline: fetch, normalize, compute indicators, summarize and convert.

use std::sync::Arc;

use serde::Serialize;
use shared::models::{BarSeries, IndicatorSeries, Metrics, Period, RateQuote};
use tracing::{debug, info};

use crate::config::AnalyzerSettings;
use crate::currency::{self, DEFAULT_FALLBACK_USD_IDR};
use crate::data::QuoteNormalizer;
use crate::error::{AnalysisError, Result};
use crate::gateway::{Clock, FetchGateway, SystemClock};
use crate::indicators::{self, IndicatorSpec};
use crate::metrics::{self, ZeroBaselinePolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub symbol: String,
    pub period: Period,
    /// Defaults to the period's own interval.
    pub interval: Option<String>,
    /// Empty means the service's default indicator set.
    pub indicators: Vec<IndicatorSpec>,
}

impl AnalysisRequest {
    pub fn new(symbol: impl Into<String>, period: Period) -> Self {
        Self {
            symbol: symbol.into(),
            period,
            interval: None,
            indicators: Vec::new(),
        }
    }

    pub fn with_interval(mut self, interval: impl Into<String>) -> Self {
        self.interval = Some(interval.into());
        self
    }

    pub fn with_indicators(mut self, indicators: Vec<IndicatorSpec>) -> Self {
        self.indicators = indicators;
        self
    }
}

/// Everything the presentation layer needs for one symbol and period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub bars: BarSeries,
    pub indicators: IndicatorSeries,
    pub metrics_usd: Metrics,
    pub metrics_idr: Metrics,
    /// The rate `metrics_idr` was computed with, and where it came from.
    pub rate: RateQuote,
}

/// Runs analyses against one gateway. Cloning shares the gateway.
#[derive(Clone)]
pub struct AnalysisService {
    gateway: Arc<dyn FetchGateway>,
    clock: Arc<dyn Clock>,
    normalizer: QuoteNormalizer,
    fallback_rate: f64,
    zero_baseline: ZeroBaselinePolicy,
    default_indicators: Arc<[IndicatorSpec]>,
}

impl AnalysisService {
    pub fn new(gateway: Arc<dyn FetchGateway>) -> Self {
        AnalysisService {
            gateway,
            clock: Arc::new(SystemClock),
            normalizer: QuoteNormalizer::default(),
            fallback_rate: DEFAULT_FALLBACK_USD_IDR,
            zero_baseline: ZeroBaselinePolicy::default(),
            default_indicators: IndicatorSpec::defaults().into(),
        }
    }

    pub fn from_settings(gateway: Arc<dyn FetchGateway>, settings: &AnalyzerSettings) -> Result<Self> {
        settings.validate()?;
        Ok(AnalysisService {
            normalizer: settings.normalizer()?,
            fallback_rate: settings.fallback_usd_idr_rate,
            zero_baseline: settings.zero_baseline_policy,
            default_indicators: settings.default_indicators.clone().into(),
            ..Self::new(gateway)
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn FetchGateway> {
        &self.gateway
    }

    pub fn fallback_rate(&self) -> f64 {
        self.fallback_rate
    }

    /// Builds the full analysis for one request.
    ///
    /// Bars and the USD/IDR rate are fetched concurrently; everything after that is pure.
    /// A symbol with no usable rows always fails with [`AnalysisError::NoData`].
    pub async fn build_analysis(&self, request: AnalysisRequest) -> Result<Analysis> {
        let symbol = request.symbol.trim().to_uppercase();
        let period = request.period;
        let no_data = || AnalysisError::NoData {
            symbol: symbol.clone(),
            period,
        };
        if symbol.is_empty() {
            return Err(no_data());
        }
        let interval = request
            .interval
            .unwrap_or_else(|| period.default_interval().to_string());
        let specs: &[IndicatorSpec] = if request.indicators.is_empty() {
            &self.default_indicators
        } else {
            &request.indicators
        };

        info!(symbol = %symbol, %period, interval = %interval, "Building analysis");
        let (raw, observed_rate) = tokio::join!(
            self.gateway.fetch_bars(&symbol, period, &interval),
            self.gateway.fetch_usd_idr_rate()
        );
        let raw = raw?;

        let bars = match self.normalizer.normalize(&raw, &symbol, period, &interval) {
            Ok(bars) if bars.is_empty() => return Err(no_data()),
            Ok(bars) => bars,
            Err(AnalysisError::EmptyInput) => return Err(no_data()),
            Err(e) => return Err(e),
        };
        debug!(symbol = %symbol, bars = bars.len(), "Normalized quotes");

        let indicators = indicators::compute(&bars, specs)?;
        let metrics_usd = match metrics::summarize_with(&bars, self.zero_baseline) {
            Err(AnalysisError::EmptyInput) => return Err(no_data()),
            other => other?,
        };

        let rate = currency::resolve_rate(observed_rate, self.fallback_rate, self.clock.now());
        let dual = currency::convert(&metrics_usd, rate.rate)?;

        info!(
            symbol = %symbol,
            bars = bars.len(),
            indicators = indicators.column_count(),
            last = metrics_usd.last,
            rate = rate.rate,
            rate_source = ?rate.source,
            "Analysis complete"
        );
        Ok(Analysis {
            bars,
            indicators,
            metrics_usd: dual.usd,
            metrics_idr: dual.idr,
            rate,
        })
    }
}
