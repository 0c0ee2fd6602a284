//! Rule-based technical analysis

use crate::analyst::{Analyst, StageError};
use crate::model::{Bar, TickerSnapshot, VolumeTrend};
use crate::reports::{Bias, Indicators, TechnicalReport, Trend};
use crate::state::PipelineState;
use async_trait::async_trait;
use chrono::Datelike;
use ta::Next;
use ta::indicators::{
    AverageTrueRange, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use tracing::debug;

const DAILY_LOOKBACK: usize = 20;
const WEEKLY_LOOKBACK: usize = 10;
/// Percentage move across the lookback that counts as a trend
const TREND_THRESHOLD_PCT: f64 = 3.0;

const PIVOT_WINDOW: usize = 2;
const LEVEL_CLUSTER_PCT: f64 = 1.5;
const MAX_LEVELS: usize = 3;
const FALLBACK_LEVEL_BARS: usize = 20;

/// Largest possible absolute vote total, used to scale strength
const MAX_VOTES: i32 = 8;

/// Trend, momentum and structure from the daily series
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalAnalyst;

impl TechnicalAnalyst {
    pub fn new() -> Self {
        Self
    }

    pub fn assess(&self, snapshot: &TickerSnapshot) -> Result<TechnicalReport, StageError> {
        let series = &snapshot.historical_series;
        if series.len() < 2 {
            return Err(StageError::InsufficientData(format!(
                "{} daily bar(s), at least 2 needed for a trend",
                series.len()
            )));
        }

        let mut flags = Vec::new();
        let price = snapshot.current_price;

        let daily_closes: Vec<f64> = series.iter().map(|b| b.close).collect();
        let daily_trend = classify_trend(&daily_closes, DAILY_LOOKBACK);

        let weekly = resample_weekly(series);
        let weekly_trend = if weekly.len() >= 2 {
            let closes: Vec<f64> = weekly.iter().map(|b| b.close).collect();
            classify_trend(&closes, WEEKLY_LOOKBACK)
        } else {
            flags.push("weekly trend unavailable: fewer than 2 weeks of data".to_string());
            Trend::Sideways
        };

        let indicators = compute_indicators(series)?;

        let mut net = 2 * daily_trend.vote() + weekly_trend.vote();

        if let Some(sma_50) = indicators.sma_50 {
            net += sign(price - sma_50);
        }
        if let (Some(sma_50), Some(sma_200)) = (indicators.sma_50, indicators.sma_200) {
            net += sign(sma_50 - sma_200);
            if sma_50 > sma_200 && daily_trend == Trend::Downtrend {
                flags.push("pullback inside a long-term uptrend".to_string());
            }
        }
        if let Some(rsi) = indicators.rsi_14 {
            if rsi < 30.0 {
                net += 1;
                flags.push(format!("RSI {rsi:.1} oversold"));
            } else if rsi > 70.0 {
                net -= 1;
                flags.push(format!("RSI {rsi:.1} overbought"));
            }
        }
        if let Some(histogram) = indicators.macd_histogram {
            net += sign(histogram);
        }

        let volume_confirmed =
            snapshot.volume_trend == VolumeTrend::High && daily_trend != Trend::Sideways;
        if volume_confirmed {
            net += daily_trend.vote();
        }

        let bias = if net >= 2 {
            Bias::Bullish
        } else if net <= -2 {
            Bias::Bearish
        } else {
            Bias::Neutral
        };
        let strength_score = strength_from_votes(net);

        let (support_levels, resistance_levels) = key_levels(series, price);

        debug!(
            ?daily_trend,
            ?weekly_trend,
            net,
            ?bias,
            strength_score,
            "Technical votes tallied"
        );

        Ok(TechnicalReport {
            daily_trend,
            weekly_trend,
            indicators,
            support_levels,
            resistance_levels,
            bias,
            strength_score,
            volume_confirmed,
            flags,
        })
    }
}

#[async_trait]
impl Analyst<TechnicalReport> for TechnicalAnalyst {
    fn name(&self) -> &str {
        "technical"
    }

    async fn analyze(&self, state: &PipelineState) -> Result<TechnicalReport, StageError> {
        self.assess(state.snapshot())
    }
}

fn sign(value: f64) -> i32 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

/// `clamp(round(1 + 9·|net|/8), 1, 10)`
fn strength_from_votes(net: i32) -> u8 {
    let scaled = 1.0 + 9.0 * f64::from(net.abs()) / f64::from(MAX_VOTES);
    scaled.round().clamp(1.0, 10.0) as u8
}

/// Percentage change across the last `lookback` closes
fn classify_trend(closes: &[f64], lookback: usize) -> Trend {
    let window = &closes[closes.len().saturating_sub(lookback)..];
    let (Some(&first), Some(&last)) = (window.first(), window.last()) else {
        return Trend::Sideways;
    };
    if window.len() < 2 || first <= 0.0 {
        return Trend::Sideways;
    }

    let change_pct = (last - first) / first * 100.0;
    if change_pct > TREND_THRESHOLD_PCT {
        Trend::Uptrend
    } else if change_pct < -TREND_THRESHOLD_PCT {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

/// Collapse daily bars into ISO-week bars dated on each week's last session
fn resample_weekly(series: &[Bar]) -> Vec<Bar> {
    let mut weeks: Vec<Bar> = Vec::new();
    let mut current_week = None;

    for bar in series {
        let iso = bar.date.iso_week();
        let key = (iso.year(), iso.week());
        match weeks.last_mut() {
            Some(week) if current_week == Some(key) => {
                week.date = bar.date;
                week.high = week.high.max(bar.high);
                week.low = week.low.min(bar.low);
                week.close = bar.close;
                week.volume += bar.volume;
            },
            _ => {
                weeks.push(*bar);
                current_week = Some(key);
            },
        }
    }
    weeks
}

fn last_value<I: Next<f64, Output = f64>>(mut indicator: I, closes: &[f64]) -> Option<f64> {
    closes.iter().map(|&close| indicator.next(close)).last()
}

fn compute_indicators(series: &[Bar]) -> Result<Indicators, StageError> {
    let backend = |e: ta::errors::TaError| StageError::Backend(format!("indicator setup failed: {e}"));
    let closes: Vec<f64> = series.iter().map(|b| b.close).collect();
    let n = closes.len();

    let mut indicators = Indicators::default();

    if n > 14 {
        indicators.rsi_14 = last_value(RelativeStrengthIndex::new(14).map_err(backend)?, &closes);

        let mut atr = AverageTrueRange::new(14).map_err(backend)?;
        indicators.atr_14 = series.iter().map(|bar| atr.next(bar)).last();
    }
    if n >= 50 {
        indicators.sma_50 = last_value(SimpleMovingAverage::new(50).map_err(backend)?, &closes);
    }
    if n >= 200 {
        indicators.sma_200 = last_value(SimpleMovingAverage::new(200).map_err(backend)?, &closes);
    }
    if n >= 26 + 9 {
        let mut macd = MovingAverageConvergenceDivergence::new(12, 26, 9).map_err(backend)?;
        if let Some(output) = closes.iter().map(|&close| macd.next(close)).last() {
            indicators.macd = Some(output.macd);
            indicators.macd_signal = Some(output.signal);
            indicators.macd_histogram = Some(output.histogram);
        }
    }

    Ok(indicators)
}

/// Pivot supports below and resistances above `price`, nearest first.
///
/// Pivots are scanned from the most recent bar backwards; a pivot within
/// 1.5% of an already accepted level is dropped, so the most recent touch
/// represents the cluster. Falls back to the 20-bar extreme when no pivot
/// qualifies.
fn key_levels(series: &[Bar], price: f64) -> (Vec<f64>, Vec<f64>) {
    let mut supports = Vec::new();
    let mut resistances = Vec::new();

    if series.len() > 2 * PIVOT_WINDOW {
        for i in (PIVOT_WINDOW..series.len() - PIVOT_WINDOW).rev() {
            let neighbours = || {
                series[i - PIVOT_WINDOW..=i + PIVOT_WINDOW]
                    .iter()
                    .enumerate()
                    .filter(move |(j, _)| *j != PIVOT_WINDOW)
                    .map(|(_, bar)| bar)
            };
            let bar = &series[i];

            if bar.low < price && neighbours().all(|n| bar.low <= n.low) {
                push_unclustered(&mut supports, bar.low);
            }
            if bar.high > price && neighbours().all(|n| bar.high >= n.high) {
                push_unclustered(&mut resistances, bar.high);
            }
        }
    }

    let recent = &series[series.len().saturating_sub(FALLBACK_LEVEL_BARS)..];
    if supports.is_empty() {
        let low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        if low < price {
            supports.push(low);
        }
    }
    if resistances.is_empty() {
        let high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
        if high > price {
            resistances.push(high);
        }
    }

    supports.sort_by(|a, b| b.total_cmp(a));
    supports.truncate(MAX_LEVELS);
    resistances.sort_by(f64::total_cmp);
    resistances.truncate(MAX_LEVELS);

    (supports, resistances)
}

fn push_unclustered(levels: &mut Vec<f64>, level: f64) {
    let clustered = levels
        .iter()
        .any(|existing| (existing - level).abs() / existing * 100.0 <= LEVEL_CLUSTER_PCT);
    if !clustered {
        levels.push(level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fixture::{series_from_closes, snapshot_from_closes, snapshot_from_series};

    fn rising(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_single_bar_is_insufficient() {
        let snapshot = snapshot_from_closes("TCS.NS", &[3500.0]);
        let err = TechnicalAnalyst::new().assess(&snapshot).unwrap_err();
        assert!(matches!(err, StageError::InsufficientData(_)));

        let fallback = TechnicalReport::insufficient(err.to_string());
        assert_eq!(fallback.bias, Bias::Neutral);
        assert_eq!(fallback.strength_score, 0);
    }

    #[test]
    fn test_two_bars_classify_trend() {
        let snapshot = snapshot_from_closes("TCS.NS", &[100.0, 105.0]);
        let report = TechnicalAnalyst::new().assess(&snapshot).unwrap();
        assert_eq!(report.daily_trend, Trend::Uptrend);
        assert!(report.strength_score >= 1);
        assert!(report.indicators.rsi_14.is_none());
    }

    #[test]
    fn test_steady_uptrend_is_bullish() {
        let snapshot = snapshot_from_closes("TCS.NS", &rising(260, 100.0, 0.5));
        let report = TechnicalAnalyst::new().assess(&snapshot).unwrap();

        assert_eq!(report.daily_trend, Trend::Uptrend);
        assert_eq!(report.weekly_trend, Trend::Uptrend);
        assert_eq!(report.bias, Bias::Bullish);
        assert!(report.indicators.sma_50.unwrap() > report.indicators.sma_200.unwrap());
        assert!((1..=10).contains(&report.strength_score));
        assert!(report.strength_score >= 6);
    }

    #[test]
    fn test_steady_downtrend_is_bearish() {
        let snapshot = snapshot_from_closes("TCS.NS", &rising(260, 300.0, -0.5));
        let report = TechnicalAnalyst::new().assess(&snapshot).unwrap();
        assert_eq!(report.daily_trend, Trend::Downtrend);
        assert_eq!(report.bias, Bias::Bearish);
    }

    #[test]
    fn test_strength_scaling() {
        assert_eq!(strength_from_votes(0), 1);
        assert_eq!(strength_from_votes(2), 3);
        assert_eq!(strength_from_votes(-4), 6);
        assert_eq!(strength_from_votes(8), 10);
        assert_eq!(strength_from_votes(12), 10);
    }

    #[test]
    fn test_weekly_resample() {
        let series = series_from_closes(&rising(10, 100.0, 1.0));
        let weekly = resample_weekly(&series);
        assert_eq!(weekly.len(), 2);
        assert!((weekly[0].close - 104.0).abs() < 1e-9);
        assert!((weekly[1].close - 109.0).abs() < 1e-9);
        assert!((weekly[1].volume - 5.0 * series[9].volume).abs() < 1e-6);
    }

    #[test]
    fn test_levels_are_ordered_nearest_first() {
        // Oscillating series leaves pivots on both sides of the last price
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + 8.0 * (i as f64 / 5.0).sin() + i as f64 * 0.05)
            .collect();
        let mut series = series_from_closes(&closes);
        let price = 102.0;
        if let Some(last) = series.last_mut() {
            last.close = price;
        }
        let snapshot = snapshot_from_series("INFY.NS", series);
        let report = TechnicalAnalyst::new().assess(&snapshot).unwrap();

        assert!(!report.support_levels.is_empty());
        assert!(!report.resistance_levels.is_empty());
        assert!(report.support_levels.len() <= MAX_LEVELS);
        assert!(report.support_levels.iter().all(|&s| s < price));
        assert!(report.resistance_levels.iter().all(|&r| r > price));
        assert!(report.support_levels.windows(2).all(|w| w[0] > w[1]));
        assert!(report.resistance_levels.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_clustering_keeps_recent_level() {
        let mut levels = vec![100.0];
        push_unclustered(&mut levels, 101.0);
        push_unclustered(&mut levels, 103.0);
        assert_eq!(levels, vec![100.0, 103.0]);
    }
}
