use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::config::SubscriptionConfig;
use crate::error::Result;

/// Per-subscription preference for new-stream notifications.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i32)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    #[default]
    Disabled = 0,
    EnabledDefault = 1,
    EnabledWithSound = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct SubscriptionEntity {
    pub uid: i64,
    pub service_id: i32,
    pub url: String,
    pub name: String,
    pub avatar_url: String,
    pub description: Option<String>,
    pub subscriber_count: Option<i64>,
    pub notification_mode: NotificationMode,
}

/// Fields for a subscription that has not been stored yet; the uid is
/// assigned by the database.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub service_id: i32,
    pub url: String,
    pub name: String,
    pub avatar_url: String,
    pub description: Option<String>,
    pub subscriber_count: Option<i64>,
    pub notification_mode: NotificationMode,
}

impl NewSubscription {
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            service_id: 0,
            url: url.into(),
            name: name.into(),
            avatar_url: String::new(),
            description: None,
            subscriber_count: None,
            notification_mode: NotificationMode::Disabled,
        }
    }

    pub fn with_avatar_url(mut self, avatar_url: impl Into<String>) -> Self {
        self.avatar_url = avatar_url.into();
        self
    }

    pub fn with_notification_mode(mut self, mode: NotificationMode) -> Self {
        self.notification_mode = mode;
        self
    }
}

impl From<&SubscriptionConfig> for NewSubscription {
    fn from(config: &SubscriptionConfig) -> Self {
        NewSubscription::new(&config.url, &config.name)
            .with_avatar_url(&config.avatar_url)
            .with_notification_mode(config.notification_mode)
    }
}

#[derive(Clone)]
pub struct SubscriptionDao {
    pool: SqlitePool,
}

impl SubscriptionDao {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a subscription, or refresh the display fields of an existing
    /// one with the same service and URL. The notification mode of an
    /// existing row is left alone. Returns the uid.
    pub async fn upsert(&self, subscription: &NewSubscription) -> Result<i64> {
        let uid: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO subscriptions
                (service_id, url, name, avatar_url, description, subscriber_count, notification_mode)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(service_id, url) DO UPDATE SET
                name = excluded.name,
                avatar_url = excluded.avatar_url,
                description = COALESCE(excluded.description, description),
                subscriber_count = COALESCE(excluded.subscriber_count, subscriber_count)
            RETURNING uid
            "#,
        )
        .bind(subscription.service_id)
        .bind(&subscription.url)
        .bind(&subscription.name)
        .bind(&subscription.avatar_url)
        .bind(&subscription.description)
        .bind(subscription.subscriber_count)
        .bind(subscription.notification_mode)
        .fetch_one(&self.pool)
        .await?;
        Ok(uid)
    }

    pub async fn sync(&self, configs: &[SubscriptionConfig]) -> Result<()> {
        for config in configs {
            self.upsert(&NewSubscription::from(config)).await?;
        }
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<SubscriptionEntity>> {
        let subscriptions =
            sqlx::query_as::<_, SubscriptionEntity>("SELECT * FROM subscriptions ORDER BY uid")
                .fetch_all(&self.pool)
                .await?;
        Ok(subscriptions)
    }

    pub async fn get(&self, uid: i64) -> Result<Option<SubscriptionEntity>> {
        let subscription =
            sqlx::query_as::<_, SubscriptionEntity>("SELECT * FROM subscriptions WHERE uid = ?")
                .bind(uid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(subscription)
    }

    pub async fn get_by_url(
        &self,
        service_id: i32,
        url: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        let subscription = sqlx::query_as::<_, SubscriptionEntity>(
            "SELECT * FROM subscriptions WHERE service_id = ? AND url = ?",
        )
        .bind(service_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscription)
    }

    /// Returns `false` when no subscription has this uid.
    pub async fn update_notification_mode(
        &self,
        uid: i64,
        mode: NotificationMode,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE subscriptions SET notification_mode = ? WHERE uid = ?")
            .bind(mode)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, uid: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM subscriptions WHERE uid = ?")
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscriptions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
