//! Presentation of new-stream notifications.

mod log;
mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::feed::FeedUpdateInfo;

pub use self::log::LogNotifier;
pub use self::webhook::WebhookNotifier;

/// Most stream titles listed in one notification.
pub const MAX_LINES: usize = 5;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Present one notification for the update.
    async fn notify(&self, update: &FeedUpdateInfo) -> Result<()>;

    /// Whether the presenter may currently show notifications at all.
    fn notifications_permitted(&self) -> bool;
}

/// What a notification shows, independent of how it is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContent {
    pub id: i32,
    pub subscription_id: i64,
    pub title: String,
    pub text: String,
    pub lines: Vec<String>,
    pub summary: Option<String>,
    pub avatar_url: String,
    pub url: String,
    pub count: usize,
}

impl NotificationContent {
    pub fn from_update(update: &FeedUpdateInfo) -> Self {
        let streams = update.new_streams();
        let count = streams.len();

        let text = if count == 1 {
            "1 new stream".to_string()
        } else {
            format!("{} new streams", count)
        };

        let lines = streams
            .iter()
            .take(MAX_LINES)
            .map(|s| s.title.clone())
            .collect();
        let summary = (count > MAX_LINES).then(|| format!("+{} more", count - MAX_LINES));

        Self {
            id: update.pseudo_id(),
            subscription_id: update.uid,
            title: update.name.clone(),
            text,
            lines,
            summary,
            avatar_url: update.avatar_url.clone(),
            url: update.list_info.url.clone(),
            count,
        }
    }
}
