//! News search discovery.
//!
//! Turns a search query into a list of candidate articles by reading a
//! Google News style RSS search feed. Each `<item>` carries a tracking link
//! that the resolver later follows to the publisher's page.
//!
//! # Feed URL
//!
//! `{feed_url}?q={query}&hl={language}&gl={country}&ceid={edition}`

use crate::backoff::{Backoff, retry_with_backoff};
use crate::config::DiscoveryConfig;
use crate::errors::DiscoveryError;
use crate::fetcher::Fetcher;
use crate::models::SearchHit;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
    #[serde(default)]
    source: Option<Source>,
}

#[derive(Debug, Deserialize)]
struct Source {
    #[serde(rename = "@url", default)]
    url: Option<String>,
    #[serde(rename = "$text", default)]
    name: Option<String>,
}

impl From<Item> for SearchHit {
    fn from(item: Item) -> Self {
        let (source_name, source_url) = match item.source {
            Some(s) => (s.name.map(|n| n.trim().to_string()), s.url),
            None => (None, None),
        };
        // Feed titles end in " - Publisher"; the publisher is reported separately.
        let title = source_name
            .as_deref()
            .and_then(|name| item.title.strip_suffix(&format!(" - {name}")))
            .unwrap_or(&item.title)
            .trim()
            .to_string();
        SearchHit {
            title,
            link: item.link.trim().to_string(),
            source_name,
            source_url,
            published: item.pub_date.map(|d| d.trim().to_string()),
        }
    }
}

/// Parse an RSS search feed into hits, dropping items without a link.
pub fn parse_feed(xml: &str) -> Result<Vec<SearchHit>, DiscoveryError> {
    let rss: Rss = quick_xml::de::from_str(xml)?;
    Ok(rss
        .channel
        .items
        .into_iter()
        .map(SearchHit::from)
        .filter(|hit| !hit.link.is_empty())
        .collect())
}

pub struct Discovery {
    fetcher: Fetcher,
    config: DiscoveryConfig,
    backoff: Backoff,
}

impl Discovery {
    pub fn new(fetcher: Fetcher, config: DiscoveryConfig) -> Self {
        Self {
            fetcher,
            config,
            backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(30), Duration::from_millis(250)),
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn search_url(&self, query: &str) -> String {
        format!(
            "{}?q={}&hl={}&gl={}&ceid={}",
            self.config.feed_url,
            urlencoding::encode(query),
            urlencoding::encode(&self.config.language),
            urlencoding::encode(&self.config.country),
            urlencoding::encode(&self.config.edition),
        )
    }

    /// Search for `query` and return at most `max_items` hits in feed order.
    #[instrument(level = "info", skip(self))]
    pub async fn search(&self, query: &str, max_items: usize) -> Result<Vec<SearchHit>, DiscoveryError> {
        let url = self.search_url(query);
        debug!(%url, "Querying search feed");

        let hits = retry_with_backoff("discovery", self.config.max_retries, self.backoff, || async {
            let page = self.fetcher.get(&url).await?;
            parse_feed(&page.body)
        })
        .await?;

        let hits: Vec<SearchHit> = hits.into_iter().take(max_items).collect();
        info!(count = hits.len(), "Discovered articles");
        Ok(hits)
    }
}
