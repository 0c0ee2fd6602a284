//! Financial ratio sources

use super::{RateGate, rate_gate};
use crate::cache::{CacheKey, TtlCache};
use crate::config::DataConfig;
use crate::error::{DataFailure, FailureReason, Result, TraderError};
use crate::model::{Ticker, ratio};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use tracing::{instrument, warn};

const ALPHA_VANTAGE_URL: &str = "https://www.alphavantage.co/query";

/// Free tier allows 5 calls per minute
const ALPHA_VANTAGE_PER_MINUTE: u32 = 5;

/// OVERVIEW field name and the ratio key it feeds
const OVERVIEW_FIELDS: &[(&str, &str)] = &[
    ("PERatio", ratio::PE),
    ("PEGRatio", ratio::PEG),
    ("PriceToBookRatio", ratio::PRICE_TO_BOOK),
    ("ProfitMargin", ratio::PROFIT_MARGIN),
    ("ReturnOnEquityTTM", ratio::RETURN_ON_EQUITY),
    ("QuarterlyEarningsGrowthYOY", ratio::EARNINGS_GROWTH),
    ("QuarterlyRevenueGrowthYOY", ratio::REVENUE_GROWTH),
];

/// Valuation and quality ratios keyed by [`ratio`] constants; may be partial
#[async_trait]
pub trait RatioSource: Send + Sync {
    async fn ratios(&self, ticker: &Ticker) -> Result<BTreeMap<String, f64>>;
}

/// Source used when no ratio provider is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRatios;

#[async_trait]
impl RatioSource for NoRatios {
    async fn ratios(&self, _ticker: &Ticker) -> Result<BTreeMap<String, f64>> {
        Ok(BTreeMap::new())
    }
}

/// Alpha Vantage company OVERVIEW endpoint
pub struct AlphaVantageRatios {
    client: Client,
    api_key: String,
    cache: TtlCache,
    gate: RateGate,
}

impl AlphaVantageRatios {
    pub fn new(api_key: impl Into<String>, config: &DataConfig, cache: TtlCache) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            cache,
            gate: rate_gate(ALPHA_VANTAGE_PER_MINUTE),
        })
    }

    async fn overview(&self, symbol: &str) -> Result<serde_json::Value> {
        self.gate.until_ready().await;

        let response = self
            .client
            .get(ALPHA_VANTAGE_URL)
            .query(&[
                ("function", "OVERVIEW"),
                ("symbol", symbol),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TraderError::Upstream(format!(
                "Alpha Vantage returned {}",
                response.status()
            )));
        }

        let data: serde_json::Value = response.json().await?;
        check_overview(symbol, data)
    }
}

#[async_trait]
impl RatioSource for AlphaVantageRatios {
    #[instrument(skip_all, fields(ticker = %ticker))]
    async fn ratios(&self, ticker: &Ticker) -> Result<BTreeMap<String, f64>> {
        let symbol = alpha_vantage_symbol(ticker);
        let key = CacheKey::new(ticker.as_str(), "overview", ());

        self.cache
            .get_or_fetch(key, || async {
                let overview = self.overview(&symbol).await?;
                let ratios = parse_overview(&overview);
                if ratios.is_empty() {
                    warn!(symbol = %symbol, "Alpha Vantage overview carried no usable ratios");
                }
                Ok(ratios)
            })
            .await
    }
}

/// Alpha Vantage lists Indian equities under their BSE symbol
fn alpha_vantage_symbol(ticker: &Ticker) -> String {
    format!("{}.BSE", ticker.symbol())
}

/// Alpha Vantage answers throttled and failed calls with HTTP 200 and a
/// message body; those must surface as errors so they are never cached
fn check_overview(symbol: &str, data: serde_json::Value) -> Result<serde_json::Value> {
    if let Some(message) = data.get("Error Message") {
        return Err(TraderError::Upstream(format!("Alpha Vantage: {message}")));
    }
    if let Some(message) = data.get("Note").or_else(|| data.get("Information")) {
        return Err(DataFailure::new(
            symbol,
            FailureReason::RateLimited,
            format!("Alpha Vantage: {message}"),
        )
        .into());
    }
    Ok(data)
}

/// Numeric OVERVIEW fields; "None", "-" and empty values are skipped
fn parse_overview(overview: &serde_json::Value) -> BTreeMap<String, f64> {
    OVERVIEW_FIELDS
        .iter()
        .filter_map(|(field, key)| {
            let value: f64 = overview.get(*field)?.as_str()?.trim().parse().ok()?;
            value.is_finite().then(|| ((*key).to_string(), value))
        })
        .collect()
}
