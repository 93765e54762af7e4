pub mod label_usecase;
pub mod quota_policy;
