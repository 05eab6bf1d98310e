use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::feed::StreamItem;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredStream {
    pub id: i64,
    pub subscription_id: i64,
    pub url: String,
    pub title: String,
    pub published: Option<String>,
    pub first_seen: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FeedLastUpdated {
    pub subscription_id: i64,
    pub last_updated: Option<String>,
    pub last_error: Option<String>,
}

/// Streams already seen per subscription, and refresh bookkeeping.
#[derive(Clone)]
pub struct FeedDao {
    pool: SqlitePool,
}

impl FeedDao {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn known_stream_urls(&self, subscription_id: i64) -> Result<HashSet<String>> {
        let urls: Vec<String> =
            sqlx::query_scalar("SELECT url FROM feed_streams WHERE subscription_id = ?")
                .bind(subscription_id)
                .fetch_all(&self.pool)
                .await?;
        Ok(urls.into_iter().collect())
    }

    /// Record streams as seen. Streams already recorded keep their
    /// `first_seen` time.
    pub async fn record_streams(&self, subscription_id: i64, streams: &[StreamItem]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for stream in streams {
            sqlx::query(
                r#"
                INSERT INTO feed_streams (subscription_id, url, title, published, first_seen)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(subscription_id, url) DO UPDATE SET
                    title = excluded.title,
                    published = COALESCE(excluded.published, published)
                "#,
            )
            .bind(subscription_id)
            .bind(&stream.url)
            .bind(&stream.title)
            .bind(stream.published.map(|p| p.to_rfc3339()))
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn streams_for_subscription(
        &self,
        subscription_id: i64,
        limit: i64,
    ) -> Result<Vec<StoredStream>> {
        let streams = sqlx::query_as::<_, StoredStream>(
            r#"
            SELECT * FROM feed_streams
            WHERE subscription_id = ?
            ORDER BY published DESC NULLS LAST, id DESC
            LIMIT ?
            "#,
        )
        .bind(subscription_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(streams)
    }

    pub async fn stream_count(&self, subscription_id: i64) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM feed_streams WHERE subscription_id = ?")
                .bind(subscription_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }

    pub async fn last_updated(&self, subscription_id: i64) -> Result<Option<FeedLastUpdated>> {
        let row = sqlx::query_as::<_, FeedLastUpdated>(
            "SELECT * FROM feed_last_updated WHERE subscription_id = ?",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// A successful refresh stamps `last_updated` and clears the error; a
    /// failed one only records the error.
    pub async fn mark_updated(&self, subscription_id: i64, error: Option<&str>) -> Result<()> {
        match error {
            None => {
                let now = Utc::now().to_rfc3339();
                sqlx::query(
                    r#"
                    INSERT INTO feed_last_updated (subscription_id, last_updated, last_error)
                    VALUES (?, ?, NULL)
                    ON CONFLICT(subscription_id) DO UPDATE SET
                        last_updated = excluded.last_updated,
                        last_error = NULL
                    "#,
                )
                .bind(subscription_id)
                .bind(now)
                .execute(&self.pool)
                .await?;
            }
            Some(error) => {
                sqlx::query(
                    r#"
                    INSERT INTO feed_last_updated (subscription_id, last_updated, last_error)
                    VALUES (?, NULL, ?)
                    ON CONFLICT(subscription_id) DO UPDATE SET
                        last_error = excluded.last_error
                    "#,
                )
                .bind(subscription_id)
                .bind(error)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}
