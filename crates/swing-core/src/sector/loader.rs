//! Sector resolution with static fallback

use super::{ConstituentSource, NseIndexConstituents, StaticConstituents};
use crate::cache::TtlCache;
use crate::config::{SectorSourceMode, TraderConfig};
use crate::error::{Result, TraderError};
use crate::gateway::RateGate;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Resolves sector ids to ticker lists.
///
/// In dynamic mode the primary source is consulted first and the fallback
/// table is used when it fails or comes back empty.
pub struct SectorLoader {
    mode: SectorSourceMode,
    primary: Arc<dyn ConstituentSource>,
    fallback: Arc<dyn ConstituentSource>,
}

impl SectorLoader {
    pub fn new(
        mode: SectorSourceMode,
        primary: Arc<dyn ConstituentSource>,
        fallback: Arc<dyn ConstituentSource>,
    ) -> Self {
        Self {
            mode,
            primary,
            fallback,
        }
    }

    /// Static table only, no network
    pub fn offline(config: &TraderConfig) -> Self {
        let table: Arc<dyn ConstituentSource> = Arc::new(StaticConstituents::new(&config.sectors.custom));
        Self::new(SectorSourceMode::Static, Arc::clone(&table), table)
    }

    /// NSE index lists backed by the built-in table, per `config.sectors.source`
    pub fn from_config(config: &TraderConfig, cache: TtlCache, gate: RateGate) -> Result<Self> {
        let fallback = Arc::new(StaticConstituents::new(&config.sectors.custom));
        let primary = Arc::new(NseIndexConstituents::new(&config.data, cache, gate)?);
        Ok(Self::new(config.sectors.source, primary, fallback))
    }

    /// Tickers for `sector`, de-duplicated in discovery order
    pub async fn resolve(&self, sector: &str) -> Result<Vec<String>> {
        let sector = sector.trim().to_ascii_uppercase();
        if sector.is_empty() {
            return Err(TraderError::UnknownSector(sector));
        }

        let mut tickers = Vec::new();
        let mut primary_error = None;
        if self.mode == SectorSourceMode::Dynamic {
            match self.primary.constituents(&sector).await {
                Ok(found) if !found.is_empty() => tickers = found,
                Ok(_) => warn!(
                    sector = %sector,
                    source = self.primary.name(),
                    "Empty constituent list, using {}",
                    self.fallback.name()
                ),
                Err(e) => {
                    warn!(
                        sector = %sector,
                        source = self.primary.name(),
                        "Constituent lookup failed, using {}: {e}",
                        self.fallback.name()
                    );
                    primary_error = Some(e);
                },
            }
        }

        if tickers.is_empty() {
            tickers = match self.fallback.constituents(&sector).await {
                Ok(found) => found,
                // A sector only the primary maps is not unknown when the primary is down
                Err(TraderError::UnknownSector(_)) => match primary_error {
                    Some(e) => return Err(e),
                    None => Vec::new(),
                },
                Err(e) => return Err(e),
            };
        }

        let mut seen = HashSet::new();
        let tickers: Vec<String> = tickers
            .into_iter()
            .map(|t| t.trim().to_ascii_uppercase())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();

        if tickers.is_empty() {
            return Err(TraderError::UnknownSector(sector));
        }

        info!(sector = %sector, count = tickers.len(), "Sector resolved");
        Ok(tickers)
    }

    /// Every sector id either source can resolve, sorted
    pub fn known_sectors(&self) -> Vec<String> {
        let mut sectors: BTreeSet<String> = self.fallback.sectors().into_iter().collect();
        if self.mode == SectorSourceMode::Dynamic {
            sectors.extend(self.primary.sectors());
        }
        sectors.into_iter().collect()
    }
}
