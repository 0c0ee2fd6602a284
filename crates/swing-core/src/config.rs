//! Configuration for the analysis core
//!
//! Values are layered from built-in defaults, an optional JSON file and the
//! environment, in that order. Every section is optional in the file.

use crate::error::{Result, TraderError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Market data backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataProvider {
    /// Yahoo Finance prices with Google News headlines (no API key required)
    #[default]
    Yahoo,
    /// Deterministic synthetic data, no network access
    Fixture,
}

impl FromStr for DataProvider {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "fixture" | "offline" => Ok(Self::Fixture),
            other => Err(TraderError::Config(format!("unknown data provider '{other}'"))),
        }
    }
}

/// Where sector constituents come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectorSourceMode {
    /// Built-in table only
    Static,
    /// Official NSE index lists, falling back to the built-in table
    #[default]
    Dynamic,
}

impl FromStr for SectorSourceMode {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" | "nse" => Ok(Self::Dynamic),
            other => Err(TraderError::Config(format!("unknown sector source '{other}'"))),
        }
    }
}

/// How the one-sentence thesis is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarratorKind {
    #[default]
    Template,
    Llm,
}

impl FromStr for NarratorKind {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "template" => Ok(Self::Template),
            "llm" | "openai" => Ok(Self::Llm),
            other => Err(TraderError::Config(format!("unknown narrator '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub provider: DataProvider,
    /// Calendar days of daily history requested
    pub history_days: u32,
    /// Bars below which a snapshot is flagged `ShortHistory`
    pub min_history_bars: usize,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Outbound calls allowed per minute across all workers
    pub requests_per_minute: u32,
    pub cache_ttl_quotes_secs: u64,
    pub cache_ttl_news_secs: u64,
    pub cache_ttl_constituents_secs: u64,
    pub max_headlines: usize,
    pub news_window_days: i64,
    #[serde(skip_serializing)]
    pub alpha_vantage_api_key: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider: DataProvider::Yahoo,
            history_days: 400,
            min_history_bars: 200,
            request_timeout_secs: 15,
            max_retries: 3,
            retry_backoff_ms: 500,
            requests_per_minute: 60,
            cache_ttl_quotes_secs: 300,
            cache_ttl_news_secs: 3600,
            cache_ttl_constituents_secs: 86_400,
            max_headlines: 10,
            news_window_days: 7,
            alpha_vantage_api_key: None,
        }
    }
}

impl DataConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorConfig {
    pub source: SectorSourceMode,
    /// Additional or overriding sectors for the built-in table
    pub custom: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub workers: usize,
    pub deadline_secs: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            deadline_secs: None,
        }
    }
}

impl ScanConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Account size in INR used for position sizing
    pub capital: f64,
    pub risk_per_trade_pct: f64,
    pub max_position_pct: f64,
    /// Distance placed beyond the nearest support or resistance
    pub stop_buffer_pct: f64,
    pub min_stop_pct: f64,
    pub max_stop_pct: f64,
    pub default_stop_pct: f64,
    pub default_target_pct: f64,
    /// ATR-14 as a percentage of price above which a trade is rejected
    pub max_volatility_pct: f64,
    pub max_risk_flags: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            capital: 10_000.0,
            risk_per_trade_pct: 1.0,
            max_position_pct: 10.0,
            stop_buffer_pct: 0.5,
            min_stop_pct: 1.0,
            max_stop_pct: 10.0,
            default_stop_pct: 5.0,
            default_target_pct: 10.0,
            max_volatility_pct: 6.0,
            max_risk_flags: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub strength_weight: f64,
    pub reward_weight: f64,
    /// Reward-to-risk at which the reward component saturates
    pub reward_cap: f64,
    pub strong_threshold: f64,
    pub watch_threshold: f64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            strength_weight: 0.6,
            reward_weight: 0.4,
            reward_cap: 5.0,
            strong_threshold: 7.0,
            watch_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub entry_band_pct: f64,
    /// Technical strength needed to act when fundamentals are neutral
    pub neutral_fundamental_min_strength: u8,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            entry_band_pct: 1.0,
            neutral_fundamental_min_strength: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub narrator: NarratorKind,
    pub model: String,
    pub api_base: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            narrator: NarratorKind::Template,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            max_tokens: 120,
            temperature: 0.2,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraderConfig {
    pub data: DataConfig,
    pub sectors: SectorConfig,
    pub scan: ScanConfig,
    pub risk: RiskConfig,
    pub ranking: RankingConfig,
    pub synthesis: SynthesisConfig,
    pub narrative: NarrativeConfig,
}

impl TraderConfig {
    /// Create a new configuration builder
    pub fn builder() -> TraderConfigBuilder {
        TraderConfigBuilder::default()
    }

    /// Load a JSON configuration file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Overlay values from the process environment
    pub fn with_env(self) -> Self {
        self.with_env_from(swing_utils::env_string)
    }

    /// Overlay values from an arbitrary variable lookup.
    ///
    /// Recognised keys: `SWING_DATA_PROVIDER`, `SWING_SECTOR_SOURCE`,
    /// `SWING_WORKERS`, `SWING_DEADLINE_SECS`, `SWING_CAPITAL`,
    /// `SWING_REQUESTS_PER_MINUTE`, `SWING_NARRATOR`, `ALPHA_VANTAGE_API_KEY`,
    /// `OPENAI_MODEL` and `OPENAI_API_BASE`. Unparsable values are logged
    /// and ignored.
    pub fn with_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = parse_var(&lookup, "SWING_DATA_PROVIDER") {
            self.data.provider = provider;
        }
        if let Some(source) = parse_var(&lookup, "SWING_SECTOR_SOURCE") {
            self.sectors.source = source;
        }
        if let Some(workers) = parse_var(&lookup, "SWING_WORKERS") {
            self.scan.workers = workers;
        }
        if let Some(secs) = parse_var(&lookup, "SWING_DEADLINE_SECS") {
            self.scan.deadline_secs = Some(secs);
        }
        if let Some(capital) = parse_var(&lookup, "SWING_CAPITAL") {
            self.risk.capital = capital;
        }
        if let Some(rpm) = parse_var(&lookup, "SWING_REQUESTS_PER_MINUTE") {
            self.data.requests_per_minute = rpm;
        }
        if let Some(narrator) = parse_var(&lookup, "SWING_NARRATOR") {
            self.narrative.narrator = narrator;
        }
        if let Some(key) = lookup("ALPHA_VANTAGE_API_KEY") {
            self.data.alpha_vantage_api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.narrative.model = model;
        }
        if let Some(base) = lookup("OPENAI_API_BASE") {
            self.narrative.api_base = Some(base);
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(TraderError::Config(msg.to_string()));

        if self.scan.workers == 0 {
            return fail("scan.workers must be greater than 0");
        }
        if self.scan.deadline_secs == Some(0) {
            return fail("scan.deadline_secs must be greater than 0 when set");
        }
        if self.data.max_retries == 0 {
            return fail("data.max_retries must be greater than 0");
        }
        if self.data.requests_per_minute == 0 {
            return fail("data.requests_per_minute must be greater than 0");
        }
        if self.data.min_history_bars < 2 {
            return fail("data.min_history_bars must be at least 2");
        }
        if self.data.max_headlines == 0 || self.data.news_window_days <= 0 {
            return fail("data.max_headlines and data.news_window_days must be positive");
        }

        let ranking = &self.ranking;
        if !(ranking.strength_weight > 0.0 && ranking.reward_weight > 0.0) {
            return fail("ranking weights must be positive");
        }
        if !(ranking.reward_cap > 0.0) {
            return fail("ranking.reward_cap must be positive");
        }
        if !(ranking.watch_threshold <= ranking.strong_threshold) {
            return fail("ranking.watch_threshold must not exceed ranking.strong_threshold");
        }

        let risk = &self.risk;
        if !(risk.capital > 0.0) {
            return fail("risk.capital must be positive");
        }
        if !(risk.risk_per_trade_pct > 0.0 && risk.risk_per_trade_pct <= 100.0) {
            return fail("risk.risk_per_trade_pct must be in (0, 100]");
        }
        if !(risk.max_position_pct > 0.0 && risk.max_position_pct <= 100.0) {
            return fail("risk.max_position_pct must be in (0, 100]");
        }
        if !(risk.min_stop_pct > 0.0
            && risk.min_stop_pct <= risk.default_stop_pct
            && risk.default_stop_pct <= risk.max_stop_pct
            && risk.max_stop_pct < 100.0)
        {
            return fail("risk stops must satisfy 0 < min_stop_pct <= default_stop_pct <= max_stop_pct < 100");
        }
        if !(risk.default_target_pct > 0.0) {
            return fail("risk.default_target_pct must be positive");
        }
        if risk.stop_buffer_pct < 0.0 {
            return fail("risk.stop_buffer_pct must not be negative");
        }

        let synthesis = &self.synthesis;
        if !(synthesis.entry_band_pct >= 0.0 && synthesis.entry_band_pct < risk.min_stop_pct) {
            return fail("synthesis.entry_band_pct must be below risk.min_stop_pct");
        }
        if synthesis.neutral_fundamental_min_strength > 10 {
            return fail("synthesis.neutral_fundamental_min_strength must be at most 10");
        }

        if self.narrative.max_tokens == 0 {
            return fail("narrative.max_tokens must be greater than 0");
        }

        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable environment value");
            None
        },
    }
}

/// Builder for TraderConfig
#[derive(Debug, Default)]
pub struct TraderConfigBuilder {
    config: TraderConfig,
}

impl TraderConfigBuilder {
    /// Start from an existing configuration (for example one loaded from a file)
    pub fn from_config(config: TraderConfig) -> Self {
        Self { config }
    }

    pub fn data(mut self, data: DataConfig) -> Self {
        self.config.data = data;
        self
    }

    pub fn provider(mut self, provider: DataProvider) -> Self {
        self.config.data.provider = provider;
        self
    }

    pub fn sector_source(mut self, source: SectorSourceMode) -> Self {
        self.config.sectors.source = source;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.config.scan.workers = workers;
        self
    }

    /// Partial seconds round up; a zero deadline is left for `build` to reject
    pub fn deadline(mut self, deadline: Duration) -> Self {
        let secs = deadline.as_secs() + u64::from(deadline.subsec_nanos() > 0);
        self.config.scan.deadline_secs = Some(secs);
        self
    }

    pub fn risk(mut self, risk: RiskConfig) -> Self {
        self.config.risk = risk;
        self
    }

    pub fn ranking(mut self, ranking: RankingConfig) -> Self {
        self.config.ranking = ranking;
        self
    }

    pub fn strong_threshold(mut self, threshold: f64) -> Self {
        self.config.ranking.strong_threshold = threshold;
        self
    }

    pub fn watch_threshold(mut self, threshold: f64) -> Self {
        self.config.ranking.watch_threshold = threshold;
        self
    }

    pub fn synthesis(mut self, synthesis: SynthesisConfig) -> Self {
        self.config.synthesis = synthesis;
        self
    }

    pub fn narrator(mut self, narrator: NarratorKind) -> Self {
        self.config.narrative.narrator = narrator;
        self
    }

    pub fn alpha_vantage_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.data.alpha_vantage_api_key = Some(key.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<TraderConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TraderConfig::default();
        assert_eq!(config.scan.workers, 4);
        assert_eq!(config.data.min_history_bars, 200);
        assert!((config.ranking.strong_threshold - 7.0).abs() < f64::EPSILON);
        assert!((config.ranking.watch_threshold - 5.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = TraderConfig::builder()
            .workers(8)
            .deadline(Duration::from_secs(30))
            .strong_threshold(8.0)
            .watch_threshold(6.0)
            .sector_source(SectorSourceMode::Static)
            .build()
            .unwrap();

        assert_eq!(config.scan.workers, 8);
        assert_eq!(config.scan.deadline(), Some(Duration::from_secs(30)));
        assert_eq!(config.sectors.source, SectorSourceMode::Static);
    }

    #[test]
    fn test_validation_rejects_inconsistent_values() {
        assert!(TraderConfig::builder().workers(0).build().is_err());
        assert!(TraderConfig::builder().deadline(Duration::ZERO).build().is_err());
        let config = TraderConfig::builder()
            .deadline(Duration::from_millis(1500))
            .build()
            .unwrap();
        assert_eq!(config.scan.deadline_secs, Some(2));
        assert!(
            TraderConfig::builder()
                .strong_threshold(4.0)
                .watch_threshold(5.0)
                .build()
                .is_err()
        );

        let mut config = TraderConfig::default();
        config.synthesis.entry_band_pct = 2.0;
        assert!(config.validate().is_err());

        let mut config = TraderConfig::default();
        config.ranking.reward_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"scan": {{"workers": 2, "deadline_secs": 90}}, "ranking": {{"strong_threshold": 7.5}}}}"#
        )
        .unwrap();

        let config = TraderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.scan.workers, 2);
        assert_eq!(config.scan.deadline_secs, Some(90));
        assert!((config.ranking.strong_threshold - 7.5).abs() < f64::EPSILON);
        assert!((config.ranking.watch_threshold - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.risk, RiskConfig::default());
    }

    #[test]
    fn test_from_file_reports_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(matches!(
            TraderConfig::from_file(file.path()),
            Err(TraderError::Json(_))
        ));
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SWING_WORKERS", "6"),
            ("SWING_SECTOR_SOURCE", "static"),
            ("SWING_NARRATOR", "llm"),
            ("SWING_CAPITAL", "not-a-number"),
            ("ALPHA_VANTAGE_API_KEY", "demo"),
        ]);

        let config = TraderConfig::default()
            .with_env_from(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.scan.workers, 6);
        assert_eq!(config.sectors.source, SectorSourceMode::Static);
        assert_eq!(config.narrative.narrator, NarratorKind::Llm);
        assert!((config.risk.capital - 10_000.0).abs() < f64::EPSILON);
        assert_eq!(config.data.alpha_vantage_api_key.as_deref(), Some("demo"));
    }
}
