use async_trait::async_trait;
use chrono::NaiveDate;

use super::quota::UserQuota;

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<UserQuota>, sqlx::Error>;

    /// Creates the row or overwrites both fields.
    async fn upsert(
        &self,
        user_id: i64,
        image_count: u32,
        access_date: NaiveDate,
    ) -> Result<(), sqlx::Error>;

    async fn count_users(&self) -> Result<i64, sqlx::Error>;
}
