//! In-memory gateway for offline runs and tests

use super::MarketDataGateway;
use crate::error::{DataFailure, FailureReason};
use crate::model::{Bar, SnapshotParts, Ticker, TickerSnapshot};
use async_trait::async_trait;
use chrono::{Datelike, Duration as ChronoDuration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const SYNTHETIC_BARS: usize = 260;
const FIXTURE_VOLUME: f64 = 1_000_000.0;

const SYNTHETIC_HEADLINES: &[&str] = &[
    "{sym} bags large export order win from European client",
    "{sym} announces partnership to expand EV component capacity",
    "{sym} posts record revenue for the quarter as demand stays firm",
    "Brokerage upgrade lifts {sym} target price",
    "{sym} faces regulatory investigation over disclosure lapses",
    "{sym} shares slip after rating downgrade",
    "{sym} management commentary signals steady margins",
];

#[derive(Debug, Clone)]
enum Entry {
    Snapshot(Box<TickerSnapshot>),
    Failure(FailureReason),
}

/// Gateway backed by canned snapshots.
///
/// Tickers without an entry either fail with `NotFound` or, when built with
/// [`FixtureGateway::synthetic`], get a deterministic generated snapshot.
#[derive(Debug, Clone, Default)]
pub struct FixtureGateway {
    entries: HashMap<String, Entry>,
    delays: HashMap<String, Duration>,
    synthesize_unknown: bool,
    min_history_bars: usize,
}

impl FixtureGateway {
    pub fn new() -> Self {
        Self {
            min_history_bars: 200,
            ..Self::default()
        }
    }

    /// Gateway that fabricates plausible data for any well-formed ticker
    pub fn synthetic(min_history_bars: usize) -> Self {
        Self {
            synthesize_unknown: true,
            min_history_bars,
            ..Self::default()
        }
    }

    pub fn with_snapshot(mut self, snapshot: TickerSnapshot) -> Self {
        self.entries.insert(
            snapshot.ticker.as_str().to_string(),
            Entry::Snapshot(Box::new(snapshot)),
        );
        self
    }

    pub fn with_failure(mut self, ticker: &str, reason: FailureReason) -> Self {
        self.entries.insert(ticker.to_ascii_uppercase(), Entry::Failure(reason));
        self
    }

    /// Delay every fetch of `ticker`, used to exercise scan deadlines
    pub fn with_delay(mut self, ticker: &str, delay: Duration) -> Self {
        self.delays.insert(ticker.to_ascii_uppercase(), delay);
        self
    }
}

#[async_trait]
impl MarketDataGateway for FixtureGateway {
    async fn fetch(&self, ticker: &str, sector: Option<&str>) -> Result<TickerSnapshot, DataFailure> {
        let ticker = Ticker::parse(ticker)?;

        if let Some(delay) = self.delays.get(ticker.as_str()) {
            tokio::time::sleep(*delay).await;
        }

        match self.entries.get(ticker.as_str()) {
            Some(Entry::Snapshot(snapshot)) => {
                let mut snapshot = snapshot.as_ref().clone();
                if snapshot.sector.is_none() {
                    snapshot.sector = sector.map(str::to_ascii_uppercase);
                }
                Ok(snapshot)
            },
            Some(Entry::Failure(reason)) => {
                Err(DataFailure::new(ticker.as_str(), *reason, "fixture failure"))
            },
            None if self.synthesize_unknown => {
                let parts = synthetic_parts(&ticker);
                TickerSnapshot::assemble(ticker, sector, parts, self.min_history_bars)
            },
            None => Err(DataFailure::not_found(ticker.as_str(), "no fixture for ticker")),
        }
    }
}

fn seed_of(ticker: &Ticker) -> u64 {
    // FNV-1a, stable across runs and platforms
    ticker.as_str().bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Deterministic series, headlines and ratios derived from the ticker name
fn synthetic_parts(ticker: &Ticker) -> SnapshotParts {
    let seed = seed_of(ticker);
    let base = 100.0 + (seed % 2_900) as f64;
    let drift = ((seed >> 8) % 9) as f64 / 1_000.0 - 0.003;
    let phase = ((seed >> 16) % 100) as f64 / 10.0;

    let closes: Vec<f64> = (0..SYNTHETIC_BARS)
        .map(|t| {
            let t = t as f64;
            base * (1.0 + drift).powf(t) * (1.0 + 0.04 * (t / 6.0 + phase).sin())
        })
        .collect();
    let mut series = series_from_closes(&closes);
    for (i, bar) in series.iter_mut().enumerate() {
        bar.volume = FIXTURE_VOLUME * (1.0 + 0.3 * ((i as f64) / 4.0 + phase).cos());
    }

    let headline_count = (seed >> 24) % 4;
    let news = (0..headline_count)
        .map(|i| {
            let idx = ((seed >> (32 + i * 3)) as usize) % SYNTHETIC_HEADLINES.len();
            SYNTHETIC_HEADLINES[idx].replace("{sym}", ticker.symbol())
        })
        .collect();

    let pe = 8.0 + ((seed >> 40) % 50) as f64;
    let ratios = BTreeMap::from([
        (crate::model::ratio::PE.to_string(), pe),
        (crate::model::ratio::PROFIT_MARGIN.to_string(), 0.12),
    ]);

    SnapshotParts {
        latest_price: closes.last().copied(),
        series,
        news,
        ratios,
    }
}

/// Weekday dates ending on a fixed Friday, one per close
fn trading_days(count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let mut day = NaiveDate::from_ymd_opt(2025, 6, 27).unwrap_or_default();
    while dates.len() < count {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(day);
        }
        day -= ChronoDuration::days(1);
    }
    dates.reverse();
    dates
}

/// Daily bars with a ±1% range around each close and flat volume
pub fn series_from_closes(closes: &[f64]) -> Vec<Bar> {
    trading_days(closes.len())
        .into_iter()
        .zip(closes.iter().enumerate())
        .map(|(date, (i, &close))| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date,
                open,
                high: open.max(close) * 1.01,
                low: open.min(close) * 0.99,
                close,
                volume: FIXTURE_VOLUME,
            }
        })
        .collect()
}

/// Snapshot whose current price is the last close; no news or ratios
#[cfg(test)]
pub fn snapshot_from_closes(ticker: &str, closes: &[f64]) -> TickerSnapshot {
    snapshot_from_series(ticker, series_from_closes(closes))
}

#[cfg(test)]
pub fn snapshot_from_series(ticker: &str, series: Vec<Bar>) -> TickerSnapshot {
    TickerSnapshot {
        ticker: Ticker::parse(ticker).unwrap(),
        sector: None,
        current_price: series.last().map_or(0.0, |bar| bar.close),
        volume_trend: crate::model::VolumeTrend::classify(&series),
        historical_series: series,
        recent_news: Vec::new(),
        financial_ratios: BTreeMap::new(),
        gaps: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_canned_snapshot_and_failure() {
        let gateway = FixtureGateway::new()
            .with_snapshot(snapshot_from_closes("ITC.NS", &[400.0, 405.0]))
            .with_failure("HUL.NS", FailureReason::Timeout);

        let snapshot = gateway.fetch("itc.ns", Some("fmcg")).await.unwrap();
        assert_eq!(snapshot.ticker.as_str(), "ITC.NS");
        assert_eq!(snapshot.sector.as_deref(), Some("FMCG"));

        let err = gateway.fetch("HUL.NS", None).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Timeout);

        let err = gateway.fetch("UNKNOWN.NS", None).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::NotFound);

        let err = gateway.fetch("not a ticker", None).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::NotFound);
    }

    #[tokio::test]
    async fn test_synthetic_is_deterministic() {
        let gateway = FixtureGateway::synthetic(200);
        let first = gateway.fetch("MARUTI.NS", Some("AUTO")).await.unwrap();
        let second = gateway.fetch("MARUTI.NS", Some("AUTO")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.historical_series.len(), SYNTHETIC_BARS);
        assert!(first.current_price > 0.0);
        assert!(!first.gaps.contains(&crate::model::DataGap::ShortHistory));
    }

    #[test]
    fn test_series_dates_are_weekdays_in_order() {
        let series = series_from_closes(&[1.0; 12]);
        assert!(series.windows(2).all(|w| w[0].date < w[1].date));
        assert!(
            series
                .iter()
                .all(|bar| !matches!(bar.date.weekday(), Weekday::Sat | Weekday::Sun))
        );
    }
}
