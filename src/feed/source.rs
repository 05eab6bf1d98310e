use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, warn};

use crate::db::SubscriptionEntity;
use crate::error::{Error, Result};

use super::{ListInfo, StreamItem};

/// Fetches the current listing of one subscription.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self, subscription: &SubscriptionEntity) -> Result<ListInfo>;
}

/// Downloads the subscription URL and parses it as an RSS or Atom feed.
pub struct HttpListingSource {
    client: Client,
}

impl HttpListingSource {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("FeedNotifier/1.0 (Subscription Watcher)")
            .build()?;

        Ok(Self { client })
    }

    pub fn parse_listing(url: &str, bytes: &[u8]) -> Result<ListInfo> {
        let parsed = parser::parse(bytes)?;

        let name = parsed
            .title
            .as_ref()
            .map(|t| t.content.clone())
            .unwrap_or_default();
        let channel_author = parsed.authors.first().map(|a| a.name.clone());

        let mut related_items = Vec::with_capacity(parsed.entries.len());
        for entry in parsed.entries {
            let title = entry
                .title
                .as_ref()
                .map(|t| t.content.clone())
                .unwrap_or_else(|| "Untitled".to_string());

            // The first link is the watch page; fall back to the entry id
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .unwrap_or_else(|| entry.id.clone());

            if link.is_empty() {
                warn!("Skipping entry with no link: {}", title);
                continue;
            }

            let uploader_name = entry
                .authors
                .first()
                .map(|a| a.name.clone())
                .or_else(|| channel_author.clone());

            let thumbnail_url = entry
                .media
                .iter()
                .flat_map(|m| m.thumbnails.iter())
                .map(|t| t.image.uri.clone())
                .next();

            let published: Option<DateTime<Utc>> = entry.published.or(entry.updated);

            related_items.push(StreamItem {
                url: link,
                title,
                uploader_name,
                thumbnail_url,
                published,
            });
        }

        Ok(ListInfo {
            url: url.to_string(),
            name,
            related_items,
        })
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn fetch(&self, subscription: &SubscriptionEntity) -> Result<ListInfo> {
        debug!("Fetching listing: {} ({})", subscription.name, subscription.url);

        let response = self.client.get(&subscription.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                url: subscription.url.clone(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        Self::parse_listing(&subscription.url, &bytes)
    }
}
