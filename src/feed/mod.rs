pub mod loader;
pub mod source;
mod update_info;

use chrono::{DateTime, Utc};
use serde::Serialize;

pub use loader::{FeedLoadError, FeedLoadManager, FeedLoadOutcome, FeedLoader};
pub use source::{HttpListingSource, ListingSource};
pub use update_info::FeedUpdateInfo;

/// One upload in a channel listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamItem {
    pub url: String,
    pub title: String,
    pub uploader_name: Option<String>,
    pub thumbnail_url: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl StreamItem {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            uploader_name: None,
            thumbnail_url: None,
            published: None,
        }
    }
}

/// A fetched listing, items in the order the source returned them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListInfo {
    pub url: String,
    pub name: String,
    pub related_items: Vec<StreamItem>,
}
