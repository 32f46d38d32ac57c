// Time-bounded memoization of the USD/IDR rate in front of another gateway.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::models::Period;
use tokio::sync::Mutex;

use super::{FetchGateway, GatewayError, RateObservation};
use crate::data::RawQuoteTable;

pub const DEFAULT_RATE_TTL: StdDuration = StdDuration::from_secs(300);

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedEntry {
    observation: RateObservation,
    fetched_at: DateTime<Utc>,
}

/// A cached rate together with how long ago it was fetched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedRate {
    pub rate: f64,
    pub age: Duration,
}

/// Serves the rate from memory while it is younger than `ttl`; bars pass straight through.
///
/// Only usable rates are stored, so a failed fetch is retried on the next request.
pub struct CachedRateGateway<G, C = SystemClock> {
    inner: G,
    clock: C,
    ttl: Duration,
    entry: Mutex<Option<CachedEntry>>,
}

impl<G: FetchGateway> CachedRateGateway<G, SystemClock> {
    pub fn new(inner: G, ttl: StdDuration) -> Self {
        Self::with_clock(inner, ttl, SystemClock)
    }
}

impl<G: FetchGateway, C: Clock> CachedRateGateway<G, C> {
    pub fn with_clock(inner: G, ttl: StdDuration, clock: C) -> Self {
        Self {
            inner,
            clock,
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::weeks(52 * 100)),
            entry: Mutex::new(None),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    /// The memoized rate, if any, regardless of whether it has expired.
    pub async fn cached_rate(&self) -> Option<CachedRate> {
        let entry = (*self.entry.lock().await)?;
        Some(CachedRate {
            rate: entry.observation.rate,
            age: self.clock.now() - entry.fetched_at,
        })
    }

    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}

#[async_trait]
impl<G: FetchGateway, C: Clock> FetchGateway for CachedRateGateway<G, C> {
    async fn fetch_bars(
        &self,
        symbol: &str,
        period: Period,
        interval: &str,
    ) -> Result<RawQuoteTable, GatewayError> {
        self.inner.fetch_bars(symbol, period, interval).await
    }

    async fn fetch_usd_idr_rate(&self) -> Option<RateObservation> {
        // Held across the fetch so concurrent callers share one provider request.
        let mut entry = self.entry.lock().await;
        let now = self.clock.now();

        if let Some(cached) = *entry {
            let age = now - cached.fetched_at;
            if age < self.ttl {
                tracing::debug!(rate = cached.observation.rate, age_secs = age.num_seconds(), "USD/IDR rate served from cache");
                return Some(RateObservation {
                    from_cache: true,
                    ..cached.observation
                });
            }
            tracing::debug!(age_secs = age.num_seconds(), "Cached USD/IDR rate expired");
        }

        let fresh = self.inner.fetch_usd_idr_rate().await;
        match fresh {
            Some(observation) if observation.rate.is_finite() && observation.rate > 0.0 => {
                *entry = Some(CachedEntry {
                    observation,
                    fetched_at: now,
                });
            }
            _ => tracing::debug!("USD/IDR fetch gave no usable rate, nothing cached"),
        }
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::InMemoryGateway;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn setup(rate: Option<f64>) -> (CachedRateGateway<InMemoryGateway, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()));
        let inner = match rate {
            Some(r) => InMemoryGateway::with_rate(r),
            None => InMemoryGateway::new(),
        };
        (CachedRateGateway::with_clock(inner, DEFAULT_RATE_TTL, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_second_fetch_within_ttl_hits_cache() {
        let (gateway, clock) = setup(Some(15_800.0));

        let first = gateway.fetch_usd_idr_rate().await.unwrap();
        assert!(!first.from_cache);

        clock.advance(Duration::seconds(299));
        let second = gateway.fetch_usd_idr_rate().await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.rate, 15_800.0);
        assert_eq!(gateway.inner().rate_fetch_count(), 1);

        let cached = gateway.cached_rate().await.unwrap();
        assert_eq!(cached.age, Duration::seconds(299));
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (gateway, clock) = setup(Some(15_800.0));
        gateway.fetch_usd_idr_rate().await.unwrap();

        gateway.inner().set_rate(Some(16_000.0)).await;
        clock.advance(Duration::seconds(300));
        let refreshed = gateway.fetch_usd_idr_rate().await.unwrap();
        assert!(!refreshed.from_cache);
        assert_eq!(refreshed.rate, 16_000.0);
        assert_eq!(gateway.inner().rate_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let (gateway, _clock) = setup(None);
        assert!(gateway.fetch_usd_idr_rate().await.is_none());
        assert!(gateway.cached_rate().await.is_none());

        gateway.inner().set_rate(Some(15_900.0)).await;
        let obs = gateway.fetch_usd_idr_rate().await.unwrap();
        assert!(!obs.from_cache);
        assert_eq!(gateway.inner().rate_fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let (gateway, _clock) = setup(Some(15_800.0));
        gateway.fetch_usd_idr_rate().await.unwrap();
        gateway.invalidate().await;
        assert!(!gateway.fetch_usd_idr_rate().await.unwrap().from_cache);
    }

    #[tokio::test]
    async fn test_bars_pass_through() {
        let (gateway, _clock) = setup(Some(15_800.0));
        let table = gateway.fetch_bars("AAPL", Period::OneDay, "5m").await.unwrap();
        assert!(table.is_empty());
        assert_eq!(gateway.inner().rate_fetch_count(), 0);
    }
}
