use crate::application::quota_policy::refresh_quota;
use crate::domain::labeling_service::{LabelError, LabelingService};
use crate::domain::quota::{QuotaDecision, DAILY_LIMIT};
use crate::domain::quota_store::QuotaStore;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};

pub const FAILURE_MESSAGE: &str = "Sorry, I could not process this image. Please try again later.";

pub fn limit_reached_message() -> String {
    format!("You have reached the daily limit of {} images.", DAILY_LIMIT)
}

/// Serializes quota handling per user so two concurrent submissions cannot
/// both pass the quota check on the same count.
///
/// An entry is removed when its last holder or waiter lets go.
#[derive(Default)]
struct UserLocks {
    inner: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl UserLocks {
    fn map(&self) -> MutexGuard<'_, HashMap<i64, Arc<Mutex<()>>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn acquire(&self, user_id: i64) -> UserGuard<'_> {
        let lock = self.map().entry(user_id).or_default().clone();
        let guard = lock.lock_owned().await;
        UserGuard {
            locks: self,
            user_id,
            guard: Some(guard),
        }
    }
}

struct UserGuard<'a> {
    locks: &'a UserLocks,
    user_id: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserGuard<'_> {
    fn drop(&mut self) {
        // Clones are only taken under the map lock, so the count is exact here.
        let mut locks = self.locks.map();
        self.guard.take();
        if locks
            .get(&self.user_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.user_id);
        }
    }
}

pub struct LabelBot {
    store: Arc<dyn QuotaStore>,
    labeler: Arc<dyn LabelingService>,
    permits: Arc<Semaphore>,
    user_locks: UserLocks,
    support_contact: Option<String>,
}

impl LabelBot {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        labeler: Arc<dyn LabelingService>,
        permits: Arc<Semaphore>,
        support_contact: Option<String>,
    ) -> Self {
        Self {
            store,
            labeler,
            permits,
            user_locks: UserLocks::default(),
            support_contact,
        }
    }

    pub async fn handle_start(&self, user_id: i64, today: NaiveDate) -> Result<String, sqlx::Error> {
        let _guard = self.user_locks.acquire(user_id).await;
        refresh_quota(self.store.as_ref(), user_id, today).await?;

        let mut greeting = format!(
            "Hello! 👋\n\n\
            I am an image to text bot. You can send up to {} images per day for conversion to text.",
            DAILY_LIMIT
        );
        if let Some(contact) = &self.support_contact {
            greeting.push_str(&format!(
                "\n\nIf you want more images, please contact {} for more details. 📩",
                contact
            ));
        }
        Ok(greeting)
    }

    /// `image` is only awaited once the quota check has passed.
    pub async fn handle_photo<F>(
        &self,
        user_id: i64,
        today: NaiveDate,
        image: F,
    ) -> Result<String, sqlx::Error>
    where
        F: Future<Output = Result<Vec<u8>, LabelError>> + Send,
    {
        let _guard = self.user_locks.acquire(user_id).await;

        let quota = refresh_quota(self.store.as_ref(), user_id, today).await?;
        let used = match quota.decide() {
            QuotaDecision::LimitReached => {
                log::info!("User {} hit the daily limit", user_id);
                return Ok(limit_reached_message());
            }
            QuotaDecision::Allowed { used } => used,
        };

        let labels = match self.label(image).await {
            Ok(labels) => labels,
            Err(e) => {
                log::warn!("Labeling failed for user {}: {}", user_id, e);
                return Ok(FAILURE_MESSAGE.to_string());
            }
        };

        self.store.upsert(user_id, used + 1, today).await?;
        log::info!(
            "User {} processed image {}/{} ({} labels)",
            user_id,
            used + 1,
            DAILY_LIMIT,
            labels.len()
        );

        Ok(format!(
            "Image processed successfully! Description:\n{}",
            labels.join("\n")
        ))
    }

    pub async fn handle_user_count(&self) -> Result<String, sqlx::Error> {
        let count = self.store.count_users().await?;
        Ok(format!("Total number of users: {}", count))
    }

    async fn label<F>(&self, image: F) -> Result<Vec<String>, LabelError>
    where
        F: Future<Output = Result<Vec<u8>, LabelError>> + Send,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LabelError::Request(e.to_string()))?;
        let bytes = image.await?;
        self.labeler.detect_labels(&bytes).await
    }
}
