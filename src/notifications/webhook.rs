use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::feed::FeedUpdateInfo;

use super::{NotificationContent, Notifier};

/// POSTs each notification as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("FeedNotifier/1.0 (Subscription Watcher)")
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, update: &FeedUpdateInfo) -> Result<()> {
        let content = NotificationContent::from_update(update);
        debug!("Posting notification {} to {}", content.id, self.url);

        let response = self.client.post(&self.url).json(&content).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Notify(format!(
                "webhook {} responded with status {}",
                self.url, status
            )));
        }
        Ok(())
    }

    fn notifications_permitted(&self) -> bool {
        !self.url.is_empty()
    }
}
