//! Yahoo Finance backed gateway

use super::{MarketDataGateway, NewsSource, RateGate, RatioSource};
use crate::cache::{CacheKey, TtlCache};
use crate::config::DataConfig;
use crate::error::{DataFailure, FailureReason};
use crate::model::{Bar, SnapshotParts, Ticker, TickerSnapshot};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use yahoo_finance_api as yahoo;

/// Prices from Yahoo Finance, headlines and ratios from pluggable sources.
///
/// Every upstream call waits on the shared [`RateGate`], is bounded by the
/// request timeout and is retried on `RateLimited` or `Timeout`.
pub struct YahooGateway {
    news: Arc<dyn NewsSource>,
    ratios: Arc<dyn RatioSource>,
    gate: RateGate,
    retry: RetryPolicy,
    cache: TtlCache,
    request_timeout: Duration,
    history_days: u32,
    min_history_bars: usize,
}

impl YahooGateway {
    pub fn new(
        config: &DataConfig,
        news: Arc<dyn NewsSource>,
        ratios: Arc<dyn RatioSource>,
        gate: RateGate,
        cache: TtlCache,
    ) -> Self {
        Self {
            news,
            ratios,
            gate,
            retry: RetryPolicy::from_config(config),
            cache,
            request_timeout: config.request_timeout(),
            history_days: config.history_days,
            min_history_bars: config.min_history_bars,
        }
    }

    async fn history(&self, ticker: &Ticker) -> Result<Vec<Bar>, DataFailure> {
        let key = CacheKey::new(ticker.as_str(), "history", self.history_days);
        self.cache
            .get_or_fetch(key, || {
                self.retry.execute("price history", || self.fetch_history_once(ticker))
            })
            .await
    }

    async fn fetch_history_once(&self, ticker: &Ticker) -> Result<Vec<Bar>, DataFailure> {
        let end = OffsetDateTime::now_utc();
        let start = end - time::Duration::days(i64::from(self.history_days));

        let quotes = self
            .call(ticker, async {
                let provider = yahoo::YahooConnector::new()?;
                provider.get_quote_history(ticker.as_str(), start, end).await?.quotes()
            })
            .await?;

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::<Utc>::from_timestamp(q.timestamp as i64, 0)?.date_naive();
                Some(Bar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume as f64,
                })
            })
            .collect())
    }

    async fn latest_price(&self, ticker: &Ticker) -> Result<f64, DataFailure> {
        let key = CacheKey::new(ticker.as_str(), "latest_quote", ());
        self.cache
            .get_or_fetch(key, || {
                self.retry.execute("latest quote", || async {
                    let quote = self
                        .call(ticker, async {
                            let provider = yahoo::YahooConnector::new()?;
                            provider.get_latest_quotes(ticker.as_str(), "1d").await?.last_quote()
                        })
                        .await?;
                    Ok(quote.close)
                })
            })
            .await
    }

    /// Rate-gate, time-bound and classify one upstream call
    async fn call<T, F>(&self, ticker: &Ticker, request: F) -> Result<T, DataFailure>
    where
        F: Future<Output = Result<T, yahoo::YahooError>>,
    {
        self.gate.until_ready().await;

        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                let detail = e.to_string();
                Err(DataFailure::new(ticker.as_str(), classify_error(&detail), detail))
            },
            Err(_) => Err(DataFailure::timeout(
                ticker.as_str(),
                format!("no answer within {:?}", self.request_timeout),
            )),
        }
    }
}

#[async_trait]
impl MarketDataGateway for YahooGateway {
    #[instrument(skip_all, fields(ticker = %ticker))]
    async fn fetch(&self, ticker: &str, sector: Option<&str>) -> Result<TickerSnapshot, DataFailure> {
        let ticker = Ticker::parse(ticker)?;

        let series = self.history(&ticker).await?;
        debug!(bars = series.len(), "Fetched price history");

        let latest_price = match self.latest_price(&ticker).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!("Latest quote unavailable, using last close: {e}");
                None
            },
        };

        let news = self.news.headlines(&ticker).await.unwrap_or_else(|e| {
            warn!("Headlines unavailable: {e}");
            Vec::new()
        });

        let ratios = self.ratios.ratios(&ticker).await.unwrap_or_else(|e| {
            warn!("Financial ratios unavailable: {e}");
            Default::default()
        });

        let parts = SnapshotParts {
            series,
            latest_price,
            news,
            ratios,
        };
        let snapshot = TickerSnapshot::assemble(ticker, sector, parts, self.min_history_bars)?;
        info!(
            price = snapshot.current_price,
            bars = snapshot.historical_series.len(),
            headlines = snapshot.recent_news.len(),
            gaps = ?snapshot.gaps,
            "Snapshot ready"
        );
        Ok(snapshot)
    }
}

/// Map upstream error text onto a failure reason
fn classify_error(message: &str) -> FailureReason {
    let message = message.to_ascii_lowercase();
    if ["429", "too many", "rate limit"].iter().any(|m| message.contains(m)) {
        FailureReason::RateLimited
    } else if ["timed out", "timeout", "connection", "connect error"]
        .iter()
        .any(|m| message.contains(m))
    {
        FailureReason::Timeout
    } else if ["not found", "404", "no data", "no quotes", "no result", "empty data", "delisted"]
        .iter()
        .any(|m| message.contains(m))
    {
        FailureReason::NotFound
    } else {
        FailureReason::Malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{NoNews, NoRatios, rate_gate};

    #[test]
    fn test_classify_error() {
        assert_eq!(classify_error("fetching the data from yahoo! finance failed: 429 Too Many Requests"), FailureReason::RateLimited);
        assert_eq!(classify_error("operation timed out"), FailureReason::Timeout);
        assert_eq!(classify_error("No quotes found"), FailureReason::NotFound);
        assert_eq!(classify_error("HTTP 404 Not Found"), FailureReason::NotFound);
        assert_eq!(classify_error("unable to deserialize response"), FailureReason::Malformed);
    }

    fn gateway() -> YahooGateway {
        YahooGateway::new(
            &DataConfig::default(),
            Arc::new(NoNews),
            Arc::new(NoRatios),
            rate_gate(60),
            TtlCache::new(Duration::from_secs(60)),
        )
    }

    #[tokio::test]
    async fn test_bad_ticker_fails_without_network() {
        let err = gateway().fetch("RELIANCE", None).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::NotFound);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_live_fetch() {
        let snapshot = gateway().fetch("TATAMOTORS.NS", Some("AUTO")).await.unwrap();
        assert!(snapshot.current_price > 0.0);
        assert!(!snapshot.historical_series.is_empty());
    }
}
