use std::time::Duration;

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use reqwest::Client;

use crate::error::Result;
use crate::models::FeedItem;

/// A fetched feed. Entries are in source order, which is normally newest first.
#[derive(Debug, Clone, Default)]
pub struct FetchedFeed {
    pub entries: Vec<FeedItem>,
}

#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed>;
}

pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .user_agent(concat!("rss-announcer/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch feed: HTTP {}", response.status()).into());
        }

        let bytes = response.bytes().await?;
        parse_feed(&bytes)
    }
}

/// Parses RSS/Atom bytes into items, keeping the document's entry order.
pub fn parse_feed(bytes: &[u8]) -> Result<FetchedFeed> {
    let feed = parser::parse(bytes)?;
    let entries = feed.entries.into_iter().map(item_from_entry).collect();
    Ok(FetchedFeed { entries })
}

fn item_from_entry(entry: Entry) -> FeedItem {
    let summary = entry.summary.map(|s| s.content);
    // RSS <description> lands in `summary`; prefer full content when the feed has it
    let description = entry
        .content
        .and_then(|c| c.body)
        .or_else(|| summary.clone());

    FeedItem {
        title: entry.title.map(|t| t.content),
        link: entry.links.first().map(|l| l.href.clone()),
        summary,
        description,
        author: entry.authors.first().map(|a| a.name.clone()),
        // feed-rs synthesises an id when the document has none
        guid: Some(entry.id).filter(|id| !id.is_empty()),
        published: entry.published.or(entry.updated),
    }
}
