pub mod labeling_service;
pub mod quota;
pub mod quota_store;
