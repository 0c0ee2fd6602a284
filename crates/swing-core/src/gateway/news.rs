//! Headline sources

use super::RateGate;
use crate::cache::{CacheKey, TtlCache};
use crate::config::DataConfig;
use crate::error::{Result, TraderError};
use crate::model::Ticker;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
use regex::Regex;
use reqwest::Client;
use std::collections::HashSet;
use tracing::{debug, instrument};
use url::Url;

const GOOGLE_NEWS_SEARCH_URL: &str = "https://news.google.com/rss/search";

/// Recent headlines for a ticker, most recent first
#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn headlines(&self, ticker: &Ticker) -> Result<Vec<String>>;
}

/// Source that never returns headlines
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNews;

#[async_trait]
impl NewsSource for NoNews {
    async fn headlines(&self, _ticker: &Ticker) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FeedItem {
    title: String,
    published: Option<DateTime<FixedOffset>>,
}

/// Google News RSS search restricted to Indian English results
pub struct GoogleNewsRss {
    client: Client,
    cache: TtlCache,
    gate: RateGate,
    max_headlines: usize,
    window_days: i64,
    item_re: Regex,
    title_re: Regex,
    date_re: Regex,
    entity_re: Regex,
}

impl GoogleNewsRss {
    pub fn new(config: &DataConfig, cache: TtlCache, gate: RateGate) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            cache,
            gate,
            max_headlines: config.max_headlines,
            window_days: config.news_window_days,
            item_re: Regex::new(r"(?s)<item>(.*?)</item>")?,
            title_re: Regex::new(r"(?s)<title>(.*?)</title>")?,
            date_re: Regex::new(r"(?s)<pubDate>(.*?)</pubDate>")?,
            entity_re: Regex::new(r"&(?:#[xX]([0-9a-fA-F]{1,6})|#([0-9]{1,7})|(amp|quot|apos|lt|gt));")?,
        })
    }

    async fn search(&self, query: &str) -> Result<Vec<FeedItem>> {
        let url = Url::parse_with_params(
            GOOGLE_NEWS_SEARCH_URL,
            &[("q", query), ("hl", "en-IN"), ("gl", "IN"), ("ceid", "IN:en")],
        )?;

        self.gate.until_ready().await;
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TraderError::Upstream(format!(
                "Google News returned {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        Ok(self.parse_feed(&body))
    }

    fn parse_feed(&self, xml: &str) -> Vec<FeedItem> {
        self.item_re
            .captures_iter(xml)
            .filter_map(|item| {
                let item = item.get(1)?.as_str();
                let title = self.title_re.captures(item)?.get(1)?.as_str();
                let published = self
                    .date_re
                    .captures(item)
                    .and_then(|c| c.get(1))
                    .and_then(|d| DateTime::parse_from_rfc2822(d.as_str().trim()).ok());
                Some(FeedItem {
                    title: self.unescape(title),
                    published,
                })
            })
            .filter(|item| !item.title.is_empty())
            .collect()
    }

    /// Strip CDATA and decode named and numeric character references in one pass
    fn unescape(&self, raw: &str) -> String {
        let text = raw
            .trim()
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>");
        self.entity_re
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let code = match (caps.get(1), caps.get(2), caps.get(3)) {
                    (Some(hex), _, _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                    (_, Some(dec), _) => dec.as_str().parse().ok(),
                    (_, _, Some(name)) => match name.as_str() {
                        "amp" => Some(u32::from('&')),
                        "quot" => Some(u32::from('"')),
                        "apos" => Some(u32::from('\'')),
                        "lt" => Some(u32::from('<')),
                        _ => Some(u32::from('>')),
                    },
                    _ => None,
                };
                // Out-of-range or surrogate code points stay as written
                code.and_then(char::from_u32)
                    .map_or_else(|| caps[0].to_string(), String::from)
            })
            .trim()
            .to_string()
    }
}

#[async_trait]
impl NewsSource for GoogleNewsRss {
    #[instrument(skip_all, fields(ticker = %ticker))]
    async fn headlines(&self, ticker: &Ticker) -> Result<Vec<String>> {
        let key = CacheKey::new(ticker.as_str(), "google_news", (self.max_headlines, self.window_days));

        self.cache
            .get_or_fetch(key, || async {
                let mut items = self.search(&format!("{} stock news India", ticker.symbol())).await?;
                if items.is_empty() {
                    debug!("No stock-news results, retrying with the bare symbol");
                    items = self.search(ticker.symbol()).await?;
                }
                Ok(select_headlines(items, Utc::now(), self.window_days, self.max_headlines))
            })
            .await
    }
}

/// Keep undated items and those inside the window, newest first, de-duplicated
fn select_headlines(
    mut items: Vec<FeedItem>,
    now: DateTime<Utc>,
    window_days: i64,
    max_headlines: usize,
) -> Vec<String> {
    let cutoff = now - ChronoDuration::days(window_days);
    items.retain(|item| item.published.is_none_or(|published| published >= cutoff));
    // Stable sort keeps feed order among equal or missing dates
    items.sort_by(|a, b| b.published.cmp(&a.published));

    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.title.to_lowercase()))
        .map(|item| item.title)
        .take(max_headlines)
        .collect()
}
