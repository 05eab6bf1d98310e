//! Local SQLite storage.
//!
//! [`Database`] owns the connection pool and hands out one DAO per table
//! family. DAOs are cheap to clone and are passed to whichever component
//! needs them.

pub mod feed;
pub mod feed_group;
pub mod subscription;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::error::Result;

pub use feed::{FeedDao, FeedLastUpdated, StoredStream};
pub use feed_group::{FeedGroupDao, FeedGroupEntity, GROUP_ALL_ID};
pub use subscription::{NewSubscription, NotificationMode, SubscriptionDao, SubscriptionEntity};

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Open an initialized in-memory database.
    ///
    /// Every SQLite connection to `:memory:` gets its own database, so the
    /// pool is pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS subscriptions (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                service_id INTEGER NOT NULL DEFAULT 0,
                url TEXT NOT NULL,
                name TEXT NOT NULL,
                avatar_url TEXT NOT NULL DEFAULT '',
                description TEXT,
                subscriber_count INTEGER,
                notification_mode INTEGER NOT NULL DEFAULT 0,
                UNIQUE(service_id, url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_streams (
                id INTEGER PRIMARY KEY,
                subscription_id INTEGER NOT NULL
                    REFERENCES subscriptions(uid) ON DELETE CASCADE,
                url TEXT NOT NULL,
                title TEXT NOT NULL,
                published TEXT,
                first_seen TEXT NOT NULL,
                UNIQUE(subscription_id, url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_last_updated (
                subscription_id INTEGER PRIMARY KEY
                    REFERENCES subscriptions(uid) ON DELETE CASCADE,
                last_updated TEXT,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_group (
                uid INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                icon_id INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_group_subscription_join (
                group_id INTEGER NOT NULL
                    REFERENCES feed_group(uid) ON DELETE CASCADE,
                subscription_id INTEGER NOT NULL
                    REFERENCES subscriptions(uid) ON DELETE CASCADE,
                PRIMARY KEY (group_id, subscription_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_feed_streams_subscription
            ON feed_streams(subscription_id, published DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn subscriptions(&self) -> SubscriptionDao {
        SubscriptionDao::new(self.pool.clone())
    }

    pub fn feed(&self) -> FeedDao {
        FeedDao::new(self.pool.clone())
    }

    pub fn feed_groups(&self) -> FeedGroupDao {
        FeedGroupDao::new(self.pool.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = Database::new("sqlite::memory:").await;
        assert!(db.is_ok());
    }

    #[tokio::test]
    async fn test_in_memory_database_is_initialized() {
        let db = Database::in_memory().await.unwrap();
        let subscriptions = db.subscriptions().get_all().await.unwrap();
        assert!(subscriptions.is_empty());
    }

    #[tokio::test]
    async fn test_double_initialization_is_safe() {
        let db = Database::in_memory().await.unwrap();
        // Initialize again - should not fail due to IF NOT EXISTS
        let result = db.initialize().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_daos_share_one_pool() {
        let db = Database::in_memory().await.unwrap();
        let uid = db
            .subscriptions()
            .upsert(&NewSubscription::new("https://a.example/feed", "A"))
            .await
            .unwrap();

        let group = db.feed_groups().create("Music", 3).await.unwrap();
        db.feed_groups().add_subscription(group, uid).await.unwrap();

        let members = db.feed_groups().subscriptions(group).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].uid, uid);
    }
}
