use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;

use super::SubscriptionEntity;

/// Pseudo group id standing for every subscription.
pub const GROUP_ALL_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct FeedGroupEntity {
    pub uid: i64,
    pub name: String,
    pub icon_id: i32,
}

#[derive(Clone)]
pub struct FeedGroupDao {
    pool: SqlitePool,
}

impl FeedGroupDao {
    pub(crate) fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, icon_id: i32) -> Result<i64> {
        let uid: i64 =
            sqlx::query_scalar("INSERT INTO feed_group (name, icon_id) VALUES (?, ?) RETURNING uid")
                .bind(name)
                .bind(icon_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(uid)
    }

    pub async fn get_all(&self) -> Result<Vec<FeedGroupEntity>> {
        let groups = sqlx::query_as::<_, FeedGroupEntity>("SELECT * FROM feed_group ORDER BY uid")
            .fetch_all(&self.pool)
            .await?;
        Ok(groups)
    }

    pub async fn rename(&self, uid: i64, name: &str, icon_id: i32) -> Result<bool> {
        let result = sqlx::query("UPDATE feed_group SET name = ?, icon_id = ? WHERE uid = ?")
            .bind(name)
            .bind(icon_id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, uid: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM feed_group WHERE uid = ?")
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn add_subscription(&self, group_id: i64, subscription_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO feed_group_subscription_join (group_id, subscription_id)
            VALUES (?, ?)
            "#,
        )
        .bind(group_id)
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn remove_subscription(&self, group_id: i64, subscription_id: i64) -> Result<()> {
        sqlx::query(
            "DELETE FROM feed_group_subscription_join WHERE group_id = ? AND subscription_id = ?",
        )
        .bind(group_id)
        .bind(subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Subscriptions in a group; [`GROUP_ALL_ID`] yields all of them.
    pub async fn subscriptions(&self, group_id: i64) -> Result<Vec<SubscriptionEntity>> {
        if group_id == GROUP_ALL_ID {
            let all =
                sqlx::query_as::<_, SubscriptionEntity>("SELECT * FROM subscriptions ORDER BY uid")
                    .fetch_all(&self.pool)
                    .await?;
            return Ok(all);
        }

        let members = sqlx::query_as::<_, SubscriptionEntity>(
            r#"
            SELECT s.* FROM subscriptions s
            INNER JOIN feed_group_subscription_join j ON j.subscription_id = s.uid
            WHERE j.group_id = ?
            ORDER BY s.uid
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }
}
