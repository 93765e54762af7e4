use chrono::NaiveDate;

/// Images a single user may submit per calendar date.
pub const DAILY_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserQuota {
    pub last_access_date: NaiveDate,
    pub image_count: u32,
}

impl UserQuota {
    pub fn fresh(today: NaiveDate) -> Self {
        Self {
            last_access_date: today,
            image_count: 0,
        }
    }

    /// Returns the row that must be written so that the count refers to `today`,
    /// or `None` when the stored row is already current.
    ///
    /// Only a strictly earlier date resets. A date in the future is left as is.
    pub fn rollover(stored: Option<Self>, today: NaiveDate) -> Option<Self> {
        match stored {
            None => Some(Self::fresh(today)),
            Some(row) if row.last_access_date < today => Some(Self::fresh(today)),
            Some(_) => None,
        }
    }

    pub fn decide(&self) -> QuotaDecision {
        if self.image_count >= DAILY_LIMIT {
            QuotaDecision::LimitReached
        } else {
            QuotaDecision::Allowed {
                used: self.image_count,
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Allowed { used: u32 },
    LimitReached,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn absent_user_gets_fresh_row() {
        let today = date(2024, 1, 1);
        assert_eq!(
            UserQuota::rollover(None, today),
            Some(UserQuota {
                last_access_date: today,
                image_count: 0
            })
        );
    }

    #[test]
    fn earlier_date_resets_any_count() {
        let today = date(2024, 1, 2);
        for count in [0, 3, 10, 42] {
            let stored = UserQuota {
                last_access_date: date(2023, 12, 31),
                image_count: count,
            };
            assert_eq!(
                UserQuota::rollover(Some(stored), today),
                Some(UserQuota::fresh(today))
            );
        }
    }

    #[test]
    fn same_day_and_future_rows_are_untouched() {
        let today = date(2024, 1, 2);
        let current = UserQuota {
            last_access_date: today,
            image_count: 7,
        };
        let future = UserQuota {
            last_access_date: date(2024, 1, 5),
            image_count: 2,
        };
        assert_eq!(UserQuota::rollover(Some(current), today), None);
        assert_eq!(UserQuota::rollover(Some(future), today), None);
    }

    #[test]
    fn limit_is_exclusive_at_ten() {
        let today = date(2024, 1, 1);
        let at = |image_count| UserQuota {
            last_access_date: today,
            image_count,
        };
        assert_eq!(at(0).decide(), QuotaDecision::Allowed { used: 0 });
        assert_eq!(at(9).decide(), QuotaDecision::Allowed { used: 9 });
        assert_eq!(at(10).decide(), QuotaDecision::LimitReached);
        assert_eq!(at(11).decide(), QuotaDecision::LimitReached);
    }
}
