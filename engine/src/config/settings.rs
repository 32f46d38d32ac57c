// Analyzer settings, loaded from the embedded default or a user-supplied JSON file
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::currency::DEFAULT_FALLBACK_USD_IDR;
use crate::data::QuoteNormalizer;
use crate::error::{AnalysisError, Result};
use crate::indicators::IndicatorSpec;
use crate::metrics::ZeroBaselinePolicy;

pub const DEFAULT_WATCHLIST: [&str; 5] = ["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA"];

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// IANA zone every bar timestamp is converted to.
    pub market_timezone: String,
    pub fallback_usd_idr_rate: f64,
    pub rate_cache_ttl_secs: u64,
    pub zero_baseline_policy: ZeroBaselinePolicy,
    pub default_indicators: Vec<IndicatorSpec>,
    pub watchlist: Vec<String>,
    /// Directory the CSV gateway reads from.
    pub data_dir: PathBuf,
    /// Used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        AnalyzerSettings {
            market_timezone: "America/New_York".to_string(),
            fallback_usd_idr_rate: DEFAULT_FALLBACK_USD_IDR,
            rate_cache_ttl_secs: 300,
            zero_baseline_policy: ZeroBaselinePolicy::default(),
            default_indicators: IndicatorSpec::defaults(),
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            data_dir: PathBuf::from("data"),
            log_level: "info".to_string(),
        }
    }
}

impl AnalyzerSettings {
    pub fn load_default() -> anyhow::Result<Self> {
        let config_str = include_str!("../../assets/config/default.json"); // Path relative to this .rs file
        let settings: AnalyzerSettings = serde_json::from_str(config_str)?;
        Ok(settings)
    }

    /// Reads a JSON settings file. Keys it leaves out keep their default values.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file '{}'", path.display()))?;
        let settings: AnalyzerSettings = serde_json::from_str(&content)
            .with_context(|| format!("Invalid settings file '{}'", path.display()))?;
        settings.validate()?;
        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fallback_usd_idr_rate.is_finite() && self.fallback_usd_idr_rate > 0.0) {
            return Err(AnalysisError::Config(format!(
                "fallback_usd_idr_rate must be positive, got {}",
                self.fallback_usd_idr_rate
            )));
        }
        self.normalizer()?;
        if self.watchlist.iter().any(|s| s.trim().is_empty()) {
            return Err(AnalysisError::Config("watchlist contains an empty symbol".to_string()));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Result<QuoteNormalizer> {
        QuoteNormalizer::for_timezone(&self.market_timezone)
    }

    pub fn rate_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.rate_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_embedded_default_matches_code_default() {
        let embedded = AnalyzerSettings::load_default().unwrap();
        assert_eq!(embedded, AnalyzerSettings::default());
        assert!(embedded.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "fallback_usd_idr_rate": 16000.0, "zero_baseline_policy": "fail" }}"#).unwrap();

        let settings = AnalyzerSettings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.fallback_usd_idr_rate, 16_000.0);
        assert_eq!(settings.zero_baseline_policy, ZeroBaselinePolicy::Fail);
        assert_eq!(settings.rate_cache_ttl(), Duration::from_secs(300));
        assert_eq!(settings.watchlist.len(), 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_rate = AnalyzerSettings {
            fallback_usd_idr_rate: 0.0,
            ..AnalyzerSettings::default()
        };
        assert!(matches!(bad_rate.validate(), Err(AnalysisError::Config(_))));

        let bad_zone = AnalyzerSettings {
            market_timezone: "Mars/Olympus_Mons".to_string(),
            ..AnalyzerSettings::default()
        };
        assert!(matches!(bad_zone.validate(), Err(AnalysisError::Config(_))));
    }

    #[test]
    fn test_unknown_indicator_in_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "default_indicators": ["SMA_20", "MACD"] }}"#).unwrap();
        let err = AnalyzerSettings::load_from_file(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid settings file"));
    }
}
