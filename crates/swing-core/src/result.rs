//! Sector scan output

use crate::error::{DataFailure, FailureReason};
use crate::ranker::{RankedEntry, Tier};
use serde::Serialize;
use std::fmt;

/// Why a ticker produced no ranked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    NotFound,
    RateLimited,
    Timeout,
    Malformed,
    /// The scan deadline passed before the run finished
    DeadlineExceeded,
    /// The run panicked or broke the stage order
    Crashed,
}

impl From<FailureReason> for FailureKind {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::NotFound => Self::NotFound,
            FailureReason::RateLimited => Self::RateLimited,
            FailureReason::Timeout => Self::Timeout,
            FailureReason::Malformed => Self::Malformed,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "NotFound",
            Self::RateLimited => "RateLimited",
            Self::Timeout => "Timeout",
            Self::Malformed => "Malformed",
            Self::DeadlineExceeded => "DeadlineExceeded",
            Self::Crashed => "Crashed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerFailure {
    pub ticker: String,
    pub failure_reason: FailureKind,
    pub detail: String,
}

impl TickerFailure {
    pub fn new(ticker: impl Into<String>, failure_reason: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            failure_reason,
            detail: detail.into(),
        }
    }
}

impl From<DataFailure> for TickerFailure {
    fn from(failure: DataFailure) -> Self {
        Self::new(failure.ticker, failure.reason.into(), failure.detail)
    }
}

/// Ranked entries (tier order) plus per-ticker failures (sector order)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorScanResult {
    sector: String,
    scanned: usize,
    ranked: Vec<RankedEntry>,
    failures: Vec<TickerFailure>,
}

impl SectorScanResult {
    pub fn new(
        sector: impl Into<String>,
        scanned: usize,
        ranked: Vec<RankedEntry>,
        failures: Vec<TickerFailure>,
    ) -> Self {
        Self {
            sector: sector.into(),
            scanned,
            ranked,
            failures,
        }
    }

    pub fn sector(&self) -> &str {
        &self.sector
    }

    /// Number of tickers the sector resolved to
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn ranked(&self) -> &[RankedEntry] {
        &self.ranked
    }

    pub fn failures(&self) -> &[TickerFailure] {
        &self.failures
    }

    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &RankedEntry> {
        self.ranked.iter().filter(move |entry| entry.tier == tier)
    }

    pub fn entry(&self, ticker: &str) -> Option<&RankedEntry> {
        self.ranked.iter().find(|entry| entry.ticker == ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_serializes_camel_case() {
        let failure: TickerFailure = DataFailure::timeout("ITC.NS", "no answer").into();
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["ticker"], "ITC.NS");
        assert_eq!(json["failureReason"], "Timeout");
    }

    #[test]
    fn test_deadline_kind_display() {
        let failure = TickerFailure::new("VBL.NS", FailureKind::DeadlineExceeded, "scan deadline");
        assert_eq!(failure.failure_reason.to_string(), "DeadlineExceeded");
    }
}
