use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::feed::FeedUpdateInfo;

use super::{NotificationContent, Notifier};

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, update: &FeedUpdateInfo) -> Result<()> {
        let content = NotificationContent::from_update(update);
        info!(
            id = content.id,
            subscription = content.subscription_id,
            "{}: {} ({})",
            content.title,
            content.text,
            content.lines.join(", ")
        );
        Ok(())
    }

    fn notifications_permitted(&self) -> bool {
        true
    }
}
