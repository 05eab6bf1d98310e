use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::db::{Database, FeedDao, FeedGroupDao, SubscriptionDao, SubscriptionEntity, GROUP_ALL_ID};
use crate::error::Result;

use super::{FeedUpdateInfo, ListingSource, StreamItem};

/// A subscription whose listing could not be loaded this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLoadError {
    pub subscription_id: i64,
    pub name: String,
    pub message: String,
}

impl fmt::Display for FeedLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to load '{}': {}", self.name, self.message)
    }
}

impl std::error::Error for FeedLoadError {}

pub type FeedLoadOutcome = std::result::Result<FeedUpdateInfo, FeedLoadError>;

/// Produces one outcome per subscription. Only failing to enumerate the
/// subscriptions is an error for the whole batch.
///
/// The new streams of an update stay unseen, and are counted again on the
/// next load, until the update is acknowledged.
#[async_trait]
pub trait FeedLoader: Send + Sync {
    async fn start_loading(&self) -> Result<Vec<FeedLoadOutcome>>;

    async fn acknowledge(&self, update: &FeedUpdateInfo) -> Result<()>;
}

pub struct FeedLoadManager {
    subscriptions: SubscriptionDao,
    groups: FeedGroupDao,
    feed: FeedDao,
    source: Arc<dyn ListingSource>,
    group_id: i64,
}

impl FeedLoadManager {
    pub fn new(db: &Database, source: Arc<dyn ListingSource>) -> Self {
        Self {
            subscriptions: db.subscriptions(),
            groups: db.feed_groups(),
            feed: db.feed(),
            source,
            group_id: GROUP_ALL_ID,
        }
    }

    /// Restrict loading to the members of one feed group.
    pub fn for_group(mut self, group_id: i64) -> Self {
        self.group_id = group_id;
        self
    }

    async fn load_subscriptions(&self) -> Result<Vec<SubscriptionEntity>> {
        if self.group_id == GROUP_ALL_ID {
            self.subscriptions.get_all().await
        } else {
            self.groups.subscriptions(self.group_id).await
        }
    }

    async fn load_one(&self, subscription: &SubscriptionEntity) -> Result<FeedUpdateInfo> {
        let list_info = self.source.fetch(subscription).await?;

        let first_load = self
            .feed
            .last_updated(subscription.uid)
            .await?
            .and_then(|row| row.last_updated)
            .is_none();
        let known = self.feed.known_stream_urls(subscription.uid).await?;
        let new_count = count_new_streams(&list_info.related_items, &known, first_load);

        // The leading new streams are recorded on acknowledge
        self.feed
            .record_streams(subscription.uid, &list_info.related_items[new_count..])
            .await?;
        self.feed.mark_updated(subscription.uid, None).await?;

        Ok(FeedUpdateInfo::from_subscription(
            subscription,
            list_info,
            new_count as i64,
        ))
    }
}

#[async_trait]
impl FeedLoader for FeedLoadManager {
    async fn start_loading(&self) -> Result<Vec<FeedLoadOutcome>> {
        let subscriptions = self.load_subscriptions().await?;
        info!("Loading feeds for {} subscriptions", subscriptions.len());

        let mut outcomes = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            match self.load_one(&subscription).await {
                Ok(update) => {
                    if update.new_streams_count() > 0 {
                        info!(
                            "{} new streams for '{}'",
                            update.new_streams_count(),
                            subscription.name
                        );
                    }
                    outcomes.push(Ok(update));
                }
                Err(e) => {
                    error!("Failed to load feed '{}': {}", subscription.name, e);
                    let message = e.to_string();
                    if let Err(e) = self.feed.mark_updated(subscription.uid, Some(&message)).await {
                        warn!("Could not record error for '{}': {}", subscription.name, e);
                    }
                    outcomes.push(Err(FeedLoadError {
                        subscription_id: subscription.uid,
                        name: subscription.name.clone(),
                        message,
                    }));
                }
            }
        }

        info!("Feed loading complete");
        Ok(outcomes)
    }

    async fn acknowledge(&self, update: &FeedUpdateInfo) -> Result<()> {
        if update.new_streams().is_empty() {
            return Ok(());
        }
        self.feed.record_streams(update.uid, update.new_streams()).await
    }
}

/// Leading streams not seen before. Nothing counts as new on the first load
/// of a subscription.
pub fn count_new_streams(items: &[StreamItem], known: &HashSet<String>, first_load: bool) -> usize {
    if first_load {
        return 0;
    }
    items
        .iter()
        .take_while(|item| !known.contains(&item.url))
        .count()
}
