use crate::domain::quota::UserQuota;
use crate::domain::quota_store::QuotaStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

pub struct SqliteQuotaStore {
    pub pool: SqlitePool,
}

impl SqliteQuotaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                user_id INTEGER PRIMARY KEY,
                last_access DATE,
                image_count INTEGER
            )",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for SqliteQuotaStore {
    async fn get(&self, user_id: i64) -> Result<Option<UserQuota>, sqlx::Error> {
        let row = sqlx::query("SELECT last_access, image_count FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(record) = row else {
            return Ok(None);
        };

        let last_access_date: NaiveDate = record.try_get(0)?;
        let image_count: i64 = record.try_get(1)?;
        let image_count =
            u32::try_from(image_count).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(Some(UserQuota {
            last_access_date,
            image_count,
        }))
    }

    async fn upsert(
        &self,
        user_id: i64,
        image_count: u32,
        access_date: NaiveDate,
    ) -> Result<(), sqlx::Error> {
        // One statement, so SQLite applies it atomically.
        sqlx::query(
            "INSERT INTO users (user_id, last_access, image_count) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                last_access = excluded.last_access,
                image_count = excluded.image_count",
        )
        .bind(user_id)
        .bind(access_date)
        .bind(i64::from(image_count))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_users(&self) -> Result<i64, sqlx::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_store() -> SqliteQuotaStore {
        // An in-memory database lives as long as its single connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteQuotaStore::new(pool);
        store.init().await.unwrap();
        store
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn get_on_unknown_user_is_none() {
        let store = memory_store().await;
        assert_eq!(store.get(42).await.unwrap(), None);
        assert_eq!(store.count_users().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn upsert_creates_then_overwrites() {
        let store = memory_store().await;

        store.upsert(42, 0, date(2024, 1, 1)).await.unwrap();
        assert_eq!(
            store.get(42).await.unwrap(),
            Some(UserQuota {
                last_access_date: date(2024, 1, 1),
                image_count: 0
            })
        );

        store.upsert(42, 9, date(2024, 1, 2)).await.unwrap();
        store.upsert(42, 9, date(2024, 1, 2)).await.unwrap();
        assert_eq!(
            store.get(42).await.unwrap(),
            Some(UserQuota {
                last_access_date: date(2024, 1, 2),
                image_count: 9
            })
        );
        assert_eq!(store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn count_users_counts_distinct_rows() {
        let store = memory_store().await;
        for user_id in [1, 2, 3, 2, 1] {
            store.upsert(user_id, 1, date(2024, 1, 1)).await.unwrap();
        }
        assert_eq!(store.count_users().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn negative_count_is_a_decode_error() {
        let store = memory_store().await;
        sqlx::query("INSERT INTO users (user_id, last_access, image_count) VALUES (7, '2024-01-01', -1)")
            .execute(&store.pool)
            .await
            .unwrap();
        assert!(matches!(store.get(7).await, Err(sqlx::Error::Decode(_))));
    }
}
