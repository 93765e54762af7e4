use chrono::NaiveDate;
use image_label_bot::application::quota_policy::refresh_quota;
use image_label_bot::domain::quota::UserQuota;
use image_label_bot::domain::quota_store::QuotaStore;
use image_label_bot::infrastructure::sqlite_quota_store::SqliteQuotaStore;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::Path;

async fn open(db: &Path) -> SqliteQuotaStore {
    let url = format!("sqlite:{}?mode=rwc", db.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
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
async fn rows_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("user_data.db");

    let store = open(&db).await;
    store.upsert(42, 7, date(2024, 1, 1)).await.unwrap();
    store.pool.close().await;

    let reopened = open(&db).await;
    assert_eq!(
        reopened.get(42).await.unwrap(),
        Some(UserQuota {
            last_access_date: date(2024, 1, 1),
            image_count: 7
        })
    );
    assert_eq!(reopened.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn refresh_creates_resets_and_keeps_rows() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir.path().join("user_data.db")).await;

    let created = refresh_quota(&store, 1, date(2024, 1, 1)).await.unwrap();
    assert_eq!(created, UserQuota::fresh(date(2024, 1, 1)));
    assert_eq!(store.get(1).await.unwrap(), Some(created));

    store.upsert(1, 10, date(2024, 1, 1)).await.unwrap();
    let same_day = refresh_quota(&store, 1, date(2024, 1, 1)).await.unwrap();
    assert_eq!(same_day.image_count, 10);

    let next_day = refresh_quota(&store, 1, date(2024, 1, 2)).await.unwrap();
    assert_eq!(next_day, UserQuota::fresh(date(2024, 1, 2)));
    assert_eq!(store.get(1).await.unwrap(), Some(next_day));
}

#[tokio::test]
async fn concurrent_upserts_for_distinct_users_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(open(&dir.path().join("user_data.db")).await);

    let mut tasks = Vec::new();
    for user_id in 0..20 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            store.upsert(user_id, 1, date(2024, 1, 1)).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(store.count_users().await.unwrap(), 20);
}
