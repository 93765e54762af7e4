use crate::domain::quota::UserQuota;
use crate::domain::quota_store::QuotaStore;
use chrono::NaiveDate;

/// Loads the user's row and rewrites it when the stored date is behind `today`.
///
/// The returned row is the one the quota check must run against.
pub async fn refresh_quota(
    store: &dyn QuotaStore,
    user_id: i64,
    today: NaiveDate,
) -> Result<UserQuota, sqlx::Error> {
    let stored = store.get(user_id).await?;

    match UserQuota::rollover(stored, today) {
        Some(fresh) => {
            store
                .upsert(user_id, fresh.image_count, fresh.last_access_date)
                .await?;
            if stored.is_none() {
                log::info!("New user {}", user_id);
            }
            Ok(fresh)
        }
        None => Ok(stored.unwrap_or(UserQuota::fresh(today))),
    }
}
