pub mod google_auth;
pub mod google_vision;
pub mod sqlite_quota_store;
