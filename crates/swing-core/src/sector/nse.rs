//! Constituents from the official NSE index CSVs

use super::ConstituentSource;
use crate::cache::{CacheKey, TtlCache};
use crate::config::DataConfig;
use crate::error::{Result, TraderError};
use crate::gateway::RateGate;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, instrument};

const NSE_INDICES_URL: &str = "https://archives.nseindia.com/content/indices";

/// Sector id and the index list file it maps to; AI is served by the IT index
const INDEX_FILES: &[(&str, &str)] = &[
    ("AI", "ind_niftyitlist.csv"),
    ("AUTO", "ind_niftyautolist.csv"),
    ("BANK", "ind_niftybanklist.csv"),
    ("FMCG", "ind_niftyfmcglist.csv"),
    ("IT", "ind_niftyitlist.csv"),
    ("PHARMA", "ind_niftypharmalist.csv"),
];

#[derive(Debug, Deserialize)]
struct IndexRow {
    #[serde(rename = "Symbol")]
    symbol: String,
}

pub struct NseIndexConstituents {
    client: Client,
    cache: TtlCache,
    gate: RateGate,
}

impl NseIndexConstituents {
    pub fn new(config: &DataConfig, cache: TtlCache, gate: RateGate) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // archives.nseindia.com refuses requests without a browser agent
        headers.insert(USER_AGENT, HeaderValue::from_static("Mozilla/5.0"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self { client, cache, gate })
    }

    async fn download(&self, file: &str) -> Result<String> {
        let url = format!("{NSE_INDICES_URL}/{file}");
        self.gate.until_ready().await;

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(TraderError::Upstream(format!(
                "NSE returned {} for {file}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

fn index_file(sector: &str) -> Option<&'static str> {
    INDEX_FILES
        .iter()
        .find(|(id, _)| *id == sector)
        .map(|(_, file)| *file)
}

/// `Symbol` column of an index list, suffixed for the NSE
fn parse_index_csv(body: &str) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut tickers = Vec::new();
    for row in reader.deserialize() {
        let row: IndexRow = row?;
        if !row.symbol.is_empty() {
            tickers.push(format!("{}.NS", row.symbol.to_ascii_uppercase()));
        }
    }
    Ok(tickers)
}

#[async_trait]
impl ConstituentSource for NseIndexConstituents {
    fn name(&self) -> &'static str {
        "nse"
    }

    #[instrument(skip_all, fields(sector = %sector))]
    async fn constituents(&self, sector: &str) -> Result<Vec<String>> {
        let file = index_file(sector).ok_or_else(|| TraderError::UnknownSector(sector.to_string()))?;
        let key = CacheKey::new(file, "nse_index", ());

        self.cache
            .get_or_fetch(key, || async {
                let body = self.download(file).await?;
                let tickers = parse_index_csv(&body)?;
                debug!(count = tickers.len(), "Downloaded index constituents");
                Ok(tickers)
            })
            .await
    }

    fn sectors(&self) -> Vec<String> {
        INDEX_FILES.iter().map(|(id, _)| (*id).to_string()).collect()
    }
}
