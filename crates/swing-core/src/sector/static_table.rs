//! Built-in constituent table

use super::ConstituentSource;
use crate::error::{Result, TraderError};
use async_trait::async_trait;
use std::collections::BTreeMap;

const FALLBACK_TABLE: &[(&str, &[&str])] = &[
    (
        "AI",
        &[
            "TATAELXSI.NS",
            "PERSISTENT.NS",
            "OFSS.NS",
            "CYIENT.NS",
            "HAPPSTMNDS.NS",
            "KPITTECH.NS",
            "ZENTEC.NS",
        ],
    ),
    (
        "AUTO",
        &[
            "TATAMOTORS.NS",
            "M&M.NS",
            "MARUTI.NS",
            "HEROMOTOCO.NS",
            "EICHERMOT.NS",
            "BAJAJ-AUTO.NS",
            "ASHOKLEY.NS",
        ],
    ),
    (
        "BANK",
        &["HDFCBANK.NS", "ICICIBANK.NS", "SBIN.NS", "KOTAKBANK.NS", "AXISBANK.NS"],
    ),
    (
        "PHARMA",
        &["SUNPHARMA.NS", "CIPLA.NS", "DRREDDY.NS", "DIVISLAB.NS", "TORNTPHARM.NS"],
    ),
    (
        "FMCG",
        &["HINDUNILVR.NS", "ITC.NS", "NESTLEIND.NS", "BRITANNIA.NS", "VBL.NS"],
    ),
];

/// Fixed sector table, extended or overridden by configured sectors
#[derive(Debug, Clone)]
pub struct StaticConstituents {
    table: BTreeMap<String, Vec<String>>,
}

impl Default for StaticConstituents {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl StaticConstituents {
    /// Built-in table with `custom` entries layered on top (keys are case-insensitive)
    pub fn new(custom: &BTreeMap<String, Vec<String>>) -> Self {
        let mut table: BTreeMap<String, Vec<String>> = FALLBACK_TABLE
            .iter()
            .map(|(sector, tickers)| {
                (
                    (*sector).to_string(),
                    tickers.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();

        for (sector, tickers) in custom {
            table.insert(sector.trim().to_ascii_uppercase(), tickers.clone());
        }

        Self { table }
    }
}

#[async_trait]
impl ConstituentSource for StaticConstituents {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn constituents(&self, sector: &str) -> Result<Vec<String>> {
        self.table
            .get(sector)
            .cloned()
            .ok_or_else(|| TraderError::UnknownSector(sector.to_string()))
    }

    fn sectors(&self) -> Vec<String> {
        self.table.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_sectors() {
        let table = StaticConstituents::default();
        assert_eq!(table.sectors(), vec!["AI", "AUTO", "BANK", "FMCG", "PHARMA"]);

        let auto = table.constituents("AUTO").await.unwrap();
        assert_eq!(auto.len(), 7);
        assert_eq!(auto[0], "TATAMOTORS.NS");
        assert!(auto.iter().all(|t| t.ends_with(".NS")));
    }

    #[tokio::test]
    async fn test_custom_sectors_override() {
        let custom = BTreeMap::from([
            ("defence".to_string(), vec!["HAL.NS".to_string(), "BEL.NS".to_string()]),
            ("BANK".to_string(), vec!["SBIN.NS".to_string()]),
        ]);
        let table = StaticConstituents::new(&custom);

        assert_eq!(table.constituents("DEFENCE").await.unwrap().len(), 2);
        assert_eq!(table.constituents("BANK").await.unwrap(), vec!["SBIN.NS"]);
    }

    #[tokio::test]
    async fn test_unknown_sector() {
        let err = StaticConstituents::default()
            .constituents("SPACE")
            .await
            .unwrap_err();
        assert!(matches!(err, TraderError::UnknownSector(s) if s == "SPACE"));
    }
}
