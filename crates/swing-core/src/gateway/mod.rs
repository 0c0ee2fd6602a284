//! Market data gateway
//!
//! The pipeline reaches market data only through [`MarketDataGateway`]. A
//! gateway either returns a [`TickerSnapshot`] (possibly flagged incomplete)
//! or a [`DataFailure`] when nothing usable could be gathered.

pub mod fixture;
pub mod news;
pub mod ratios;
pub mod yahoo;

pub use fixture::FixtureGateway;
pub use news::{GoogleNewsRss, NewsSource, NoNews};
pub use ratios::{AlphaVantageRatios, NoRatios, RatioSource};
pub use yahoo::YahooGateway;

use crate::error::DataFailure;
use crate::model::TickerSnapshot;
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Process-wide throttle shared by every outbound data call
pub type RateGate = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a rate gate admitting `per_minute` calls per minute
pub fn rate_gate(per_minute: u32) -> RateGate {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Gather price history, latest quote, headlines and ratios for `ticker`.
    ///
    /// Unparsable tickers fail with `NotFound`. Implementations must not
    /// mutate state visible to other runs apart from caches and the rate gate.
    async fn fetch(&self, ticker: &str, sector: Option<&str>) -> Result<TickerSnapshot, DataFailure>;
}
