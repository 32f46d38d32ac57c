// Exponential Moving Average (EMA) indicator implementation
use super::IndicatorCalculator;
use shared::models::PriceBar;
use serde_json::Value;

pub struct Ema {
    name: String,
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            name: format!("EMA_{}", period),
            period,
        }
    }
}

impl IndicatorCalculator for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameters(&self) -> Value {
        serde_json::json!({ "period": self.period, "alpha": 2.0 / (self.period as f64 + 1.0) })
    }

    fn calculate(&self, data: &[PriceBar]) -> Vec<Option<f64>> {
        if self.period == 0 || data.len() < self.period {
            return vec![None; data.len()];
        }

        let mut results = vec![None; self.period - 1];
        let multiplier = 2.0 / (self.period as f64 + 1.0);

        // Seeded with the SMA of the first window
        let initial_sum: f64 = data.iter().take(self.period).map(|c| c.close).sum();
        let mut previous_ema = initial_sum / self.period as f64;
        results.push(Some(previous_ema));

        for bar in data.iter().skip(self.period) {
            let ema = (bar.close - previous_ema) * multiplier + previous_ema;
            results.push(Some(ema));
            previous_ema = ema;
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_bars;

    #[test]
    fn test_ema_calculation() {
        let bars = test_bars(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let results = Ema::new(3).calculate(&bars);
        // SMA for first 3: (10+11+12)/3 = 11.0
        // EMA for 13: (13 - 11.0) * 0.5 + 11.0 = 12.0
        // EMA for 14: (14 - 12.0) * 0.5 + 12.0 = 13.0
        assert_eq!(results.len(), 5);
        assert_eq!(results[0], None);
        assert_eq!(results[1], None);
        assert_eq!(results[2], Some(11.0));
        assert_eq!(results[3], Some(12.0));
        assert_eq!(results[4], Some(13.0));
    }

    #[test]
    fn test_ema_constant_series_stays_constant() {
        let bars = test_bars(&[50.0; 30]);
        let results = Ema::new(20).calculate(&bars);
        assert!(results[..19].iter().all(Option::is_none));
        assert!(results[19..].iter().all(|v| *v == Some(50.0)));
    }

    #[test]
    fn test_ema_window_longer_than_series() {
        let bars = test_bars(&[1.0, 2.0, 3.0]);
        assert_eq!(Ema::new(50).calculate(&bars), vec![None; 3]);
    }
}
