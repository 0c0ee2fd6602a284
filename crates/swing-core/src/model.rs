//! Market data model shared by the gateway and the analysis stages

use crate::error::DataFailure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bars averaged for the short side of the volume comparison
const VOLUME_SHORT_WINDOW: usize = 5;
/// Bars averaged for the baseline side of the volume comparison
const VOLUME_LONG_WINDOW: usize = 50;
const VOLUME_HIGH_RATIO: f64 = 1.2;
const VOLUME_LOW_RATIO: f64 = 0.8;

/// Keys used in [`TickerSnapshot::financial_ratios`]
pub mod ratio {
    pub const PE: &str = "pe_ratio";
    pub const PEG: &str = "peg_ratio";
    pub const PRICE_TO_BOOK: &str = "price_to_book";
    pub const PROFIT_MARGIN: &str = "profit_margin";
    pub const RETURN_ON_EQUITY: &str = "return_on_equity";
    pub const DEBT_TO_EQUITY: &str = "debt_to_equity";
    pub const EARNINGS_GROWTH: &str = "quarterly_earnings_growth";
    pub const REVENUE_GROWTH: &str = "quarterly_revenue_growth";
}

/// Exchange-qualified ticker such as `TATAMOTORS.NS` or `500570.BO`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Parse and normalise a ticker.
    ///
    /// Symbols are upper-cased and must carry a `.NS` or `.BO` suffix. The
    /// symbol part may contain `A-Z`, `0-9`, `&` and `-` (`M&M.NS`,
    /// `BAJAJ-AUTO.NS`). Anything else is reported as
    /// [`FailureReason::NotFound`](crate::error::FailureReason::NotFound).
    pub fn parse(raw: &str) -> Result<Self, DataFailure> {
        let normalized = raw.trim().to_ascii_uppercase();

        let Some((symbol, suffix)) = normalized.rsplit_once('.') else {
            return Err(DataFailure::not_found(
                normalized,
                "missing exchange suffix (.NS or .BO)",
            ));
        };

        if suffix != "NS" && suffix != "BO" {
            return Err(DataFailure::not_found(
                normalized.clone(),
                format!("unsupported exchange suffix .{suffix}"),
            ));
        }

        let valid_symbol = !symbol.is_empty()
            && symbol
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '&' || c == '-');
        if !valid_symbol {
            return Err(DataFailure::not_found(
                normalized.clone(),
                format!("invalid symbol '{symbol}'"),
            ));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol without the exchange suffix
    pub fn symbol(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(symbol, _)| symbol)
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Ticker {
    type Error = DataFailure;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(ticker: Ticker) -> Self {
        ticker.0
    }
}

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::Open for Bar {
    fn open(&self) -> f64 {
        self.open
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Bar {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Recent participation relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VolumeTrend {
    High,
    Low,
    #[default]
    Average,
}

impl VolumeTrend {
    /// Compare the mean volume of the last 5 bars against the last 50.
    pub fn classify(series: &[Bar]) -> Self {
        if series.len() < VOLUME_SHORT_WINDOW {
            return Self::Average;
        }

        let mean = |bars: &[Bar]| bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
        let short = mean(&series[series.len() - VOLUME_SHORT_WINDOW..]);
        let long = mean(&series[series.len().saturating_sub(VOLUME_LONG_WINDOW)..]);

        if long <= 0.0 || !long.is_finite() {
            return Self::Average;
        }

        let ratio = short / long;
        if ratio >= VOLUME_HIGH_RATIO {
            Self::High
        } else if ratio <= VOLUME_LOW_RATIO {
            Self::Low
        } else {
            Self::Average
        }
    }
}

/// Reason a snapshot is only partially populated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataGap {
    /// Fewer bars than the configured lookback
    ShortHistory,
    /// No financial ratios were available
    NoRatios,
    /// No headlines inside the news window
    NoNews,
    /// Latest quote unavailable, last close used instead
    StaleQuote,
}

/// Raw inputs gathered by a gateway before they become a snapshot
#[derive(Debug, Clone, Default)]
pub struct SnapshotParts {
    pub series: Vec<Bar>,
    pub latest_price: Option<f64>,
    pub news: Vec<String>,
    pub ratios: BTreeMap<String, f64>,
}

/// Everything the analysis stages know about one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSnapshot {
    pub ticker: Ticker,
    pub sector: Option<String>,
    pub current_price: f64,
    pub volume_trend: VolumeTrend,
    /// Daily bars, oldest first
    pub historical_series: Vec<Bar>,
    /// Headlines, most recent first
    pub recent_news: Vec<String>,
    pub financial_ratios: BTreeMap<String, f64>,
    pub gaps: Vec<DataGap>,
}

impl TickerSnapshot {
    /// Build a snapshot from gateway output.
    ///
    /// Fails with `NotFound` when there is no price history at all and with
    /// `Malformed` when no positive price can be established. Everything
    /// else that is missing is recorded as a [`DataGap`].
    pub fn assemble(
        ticker: Ticker,
        sector: Option<&str>,
        parts: SnapshotParts,
        min_history_bars: usize,
    ) -> Result<Self, DataFailure> {
        let SnapshotParts {
            mut series,
            latest_price,
            news,
            ratios,
        } = parts;

        series.retain(|bar| bar.close.is_finite() && bar.close > 0.0);
        series.sort_by_key(|bar| bar.date);
        series.dedup_by_key(|bar| bar.date);

        let Some(last_close) = series.last().map(|bar| bar.close) else {
            return Err(DataFailure::not_found(ticker.as_str(), "no price history"));
        };

        let mut gaps = Vec::new();
        if series.len() < min_history_bars {
            gaps.push(DataGap::ShortHistory);
        }

        let current_price = match latest_price {
            Some(price) if price.is_finite() && price > 0.0 => price,
            Some(price) => {
                return Err(DataFailure::malformed(
                    ticker.as_str(),
                    format!("latest price {price} is not a positive number"),
                ));
            },
            None => {
                gaps.push(DataGap::StaleQuote);
                last_close
            },
        };

        let financial_ratios: BTreeMap<String, f64> =
            ratios.into_iter().filter(|(_, v)| v.is_finite()).collect();
        if financial_ratios.is_empty() {
            gaps.push(DataGap::NoRatios);
        }

        let recent_news: Vec<String> = news
            .into_iter()
            .map(|headline| headline.trim().to_string())
            .filter(|headline| !headline.is_empty())
            .collect();
        if recent_news.is_empty() {
            gaps.push(DataGap::NoNews);
        }

        Ok(Self {
            volume_trend: VolumeTrend::classify(&series),
            ticker,
            sector: sector.map(|s| s.trim().to_ascii_uppercase()),
            current_price,
            historical_series: series,
            recent_news,
            financial_ratios,
            gaps,
        })
    }

    /// Whether any part of the snapshot is missing
    pub fn is_incomplete(&self) -> bool {
        !self.gaps.is_empty()
    }

    pub fn ratio(&self, key: &str) -> Option<f64> {
        self.financial_ratios.get(key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureReason;
    use crate::gateway::fixture::series_from_closes;

    #[test]
    fn test_ticker_parse() {
        let ticker = Ticker::parse(" m&m.ns ").unwrap();
        assert_eq!(ticker.as_str(), "M&M.NS");
        assert_eq!(ticker.symbol(), "M&M");

        let ticker = Ticker::parse("BAJAJ-AUTO.BO").unwrap();
        assert_eq!(ticker.symbol(), "BAJAJ-AUTO");

        for bad in ["TATAMOTORS", "AAPL.US", ".NS", "TATA MOTORS.NS", ""] {
            let err = Ticker::parse(bad).unwrap_err();
            assert_eq!(err.reason, FailureReason::NotFound, "{bad}");
        }
    }

    #[test]
    fn test_ticker_serde() {
        let ticker: Ticker = serde_json::from_str("\"infy.ns\"").unwrap();
        assert_eq!(ticker.as_str(), "INFY.NS");
        assert!(serde_json::from_str::<Ticker>("\"INFY\"").is_err());
    }

    #[test]
    fn test_volume_trend() {
        let mut series = series_from_closes(&[100.0; 60]);
        assert_eq!(VolumeTrend::classify(&series), VolumeTrend::Average);

        for bar in series.iter_mut().rev().take(5) {
            bar.volume *= 3.0;
        }
        assert_eq!(VolumeTrend::classify(&series), VolumeTrend::High);

        for bar in series.iter_mut().rev().take(5) {
            bar.volume = 100.0;
        }
        assert_eq!(VolumeTrend::classify(&series), VolumeTrend::Low);
    }

    #[test]
    fn test_assemble_flags_gaps() {
        let ticker = Ticker::parse("TCS.NS").unwrap();
        let parts = SnapshotParts {
            series: series_from_closes(&[100.0, 101.0, 102.0]),
            ..SnapshotParts::default()
        };

        let snapshot = TickerSnapshot::assemble(ticker, Some("it"), parts, 200).unwrap();
        assert!(snapshot.is_incomplete());
        assert_eq!(
            snapshot.gaps,
            vec![
                DataGap::ShortHistory,
                DataGap::StaleQuote,
                DataGap::NoRatios,
                DataGap::NoNews
            ]
        );
        assert!((snapshot.current_price - 102.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.sector.as_deref(), Some("IT"));
    }

    #[test]
    fn test_assemble_without_history_is_not_found() {
        let ticker = Ticker::parse("GHOST.NS").unwrap();
        let err = TickerSnapshot::assemble(ticker, None, SnapshotParts::default(), 200).unwrap_err();
        assert_eq!(err.reason, FailureReason::NotFound);
    }

    #[test]
    fn test_assemble_rejects_bad_quote() {
        let ticker = Ticker::parse("TCS.NS").unwrap();
        let parts = SnapshotParts {
            series: series_from_closes(&[100.0, 101.0]),
            latest_price: Some(-1.0),
            ..SnapshotParts::default()
        };
        let err = TickerSnapshot::assemble(ticker, None, parts, 2).unwrap_err();
        assert_eq!(err.reason, FailureReason::Malformed);
    }
}
