//! Sector to ticker resolution

pub mod loader;
pub mod nse;
pub mod static_table;

pub use loader::SectorLoader;
pub use nse::NseIndexConstituents;
pub use static_table::StaticConstituents;

use crate::error::Result;
use async_trait::async_trait;

/// Provider of the tickers that make up a sector
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConstituentSource: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Tickers in `sector` (already upper-cased), with exchange suffix
    async fn constituents(&self, sector: &str) -> Result<Vec<String>>;

    /// Sector ids this source can resolve
    fn sectors(&self) -> Vec<String>;
}
