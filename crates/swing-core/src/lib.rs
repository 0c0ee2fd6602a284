//! Swing-trade analysis for Indian equities
//!
//! This crate turns market data for NSE/BSE tickers into structured trade
//! recommendations. It includes:
//!
//! - A data gateway over Yahoo Finance prices, Google News headlines and
//!   Alpha Vantage ratios, with caching, retries and a shared rate gate
//! - Rule-based technical, fundamental, risk and synthesis stages
//! - A single-ticker pipeline that degrades instead of failing
//! - A sector scanner with a bounded worker pool and optional deadline
//! - A ranker that scores and tiers scan results
//!
//! # Architecture
//!
//! Each ticker run flows through the stages in a fixed order, growing an
//! immutable [`PipelineState`]:
//! - `MarketDataGateway` fetches a [`TickerSnapshot`]
//! - `TechnicalAnalyst` reads trend, indicators and key levels
//! - `FundamentalAnalyst` screens headlines and ratios
//! - `RiskAnalyst` sets stop, targets and size and applies the approval gate
//! - `SynthesisAnalyst` emits the [`TradeSignal`] with a one-line thesis
//!
//! # Example
//!
//! ```rust,ignore
//! use swing_core::{AnalysisBackend, FixtureGateway, Pipeline, TemplateNarrator, TraderConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = TraderConfig::default().with_env();
//!     let backend = AnalysisBackend::rule_based(&config, Arc::new(TemplateNarrator))?;
//!     let pipeline = Pipeline::new(Arc::new(FixtureGateway::synthetic(200)), backend);
//!
//!     let report = pipeline.analyze("TATAMOTORS.NS", Some("AUTO")).await?;
//!     println!("{}: {}", report.signal.action(), report.signal.thesis());
//!     Ok(())
//! }
//! ```

pub mod analyst;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod narrative;
pub mod pipeline;
pub mod ranker;
pub mod reports;
pub mod result;
pub mod retry;
pub mod scanner;
pub mod sector;
pub mod stages;
pub mod state;

pub use analyst::{AnalysisBackend, Analyst, StageError, Verdict};
pub use cache::{CacheTiers, TtlCache};
pub use config::{
    DataProvider, NarratorKind, RankingConfig, ScanConfig, SectorSourceMode, TraderConfig,
    TraderConfigBuilder,
};
pub use error::{DataFailure, FailureReason, Result, TraderError};
pub use gateway::{
    AlphaVantageRatios, FixtureGateway, GoogleNewsRss, MarketDataGateway, NewsSource, NoNews,
    NoRatios, RatioSource, YahooGateway, rate_gate,
};
pub use model::{Bar, Ticker, TickerSnapshot};
pub use narrative::{LlmNarrator, Narrator, TemplateNarrator};
pub use pipeline::Pipeline;
pub use ranker::{RankedEntry, Tier};
pub use reports::{Action, Bias, FundamentalReport, RiskAssessment, TechnicalReport, TradeSignal};
pub use result::{FailureKind, SectorScanResult, TickerFailure};
pub use scanner::SectorScanner;
pub use sector::{SectorLoader, StaticConstituents};
pub use state::{PipelineOutcome, PipelineReport, PipelineState};
