// USD -> IDR conversion of summary metrics.

use chrono::{DateTime, Utc};
use shared::models::{DualMetrics, Metrics, RateQuote, RateSource};
use tracing::warn;

use crate::error::{AnalysisError, Result};
use crate::gateway::RateObservation;

/// Used when no live USD/IDR quote can be obtained and nothing else is configured.
pub const DEFAULT_FALLBACK_USD_IDR: f64 = 15_700.0;

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

/// Scales every price field by `rate`. `change_percent` and `total_volume` are copied as-is.
pub fn convert(usd: &Metrics, rate: f64) -> Result<DualMetrics> {
    if !is_valid_rate(rate) {
        return Err(AnalysisError::InvalidRate(rate));
    }
    let idr = Metrics {
        last: usd.last * rate,
        first: usd.first * rate,
        high: usd.high * rate,
        low: usd.low * rate,
        change: usd.change * rate,
        change_percent: usd.change_percent,
        total_volume: usd.total_volume,
    };
    Ok(DualMetrics {
        usd: *usd,
        idr,
        rate,
    })
}

/// Picks the rate for one analysis: the observed one when usable, else `fallback`.
///
/// A non-positive or non-finite observation is treated like an unavailable one.
pub fn resolve_rate(
    observed: Option<RateObservation>,
    fallback: f64,
    now: DateTime<Utc>,
) -> RateQuote {
    match observed {
        Some(obs) if is_valid_rate(obs.rate) => RateQuote {
            rate: obs.rate,
            source: if obs.from_cache {
                RateSource::Cached
            } else {
                RateSource::Live
            },
            as_of: obs.observed_at,
        },
        Some(obs) => {
            warn!(rate = obs.rate, fallback, "Rejected invalid USD/IDR rate from provider, using fallback");
            fallback_quote(fallback, now)
        }
        None => {
            warn!(fallback, "USD/IDR rate unavailable, using fallback");
            fallback_quote(fallback, now)
        }
    }
}

fn fallback_quote(fallback: f64, now: DateTime<Utc>) -> RateQuote {
    RateQuote {
        rate: fallback,
        source: RateSource::Fallback,
        as_of: now,
    }
}
