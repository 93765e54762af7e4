use crate::infrastructure::google_vision::DEFAULT_VISION_ENDPOINT;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub credentials_path: PathBuf,
    pub database_url: String,
    pub vision_endpoint: String,
    pub vision_timeout: Duration,
    pub max_concurrent_labeling: usize,
    pub support_contact: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let bot_token = required("BOT_TOKEN")?;
        let credentials_path = PathBuf::from(required("GOOGLE_APPLICATION_CREDENTIALS")?);

        let vision_timeout_secs: u64 = parse_or(&lookup, "VISION_TIMEOUT_SECS", 30)?;
        let max_concurrent_labeling: usize = parse_or(&lookup, "MAX_CONCURRENT_LABELING", 3)?;
        if max_concurrent_labeling == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_CONCURRENT_LABELING",
                reason: "must be at least 1".into(),
            });
        }

        Ok(Config {
            bot_token,
            credentials_path,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:user_data.db?mode=rwc".to_string()),
            vision_endpoint: lookup("VISION_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_VISION_ENDPOINT.to_string()),
            vision_timeout: Duration::from_secs(vision_timeout_secs),
            max_concurrent_labeling,
            support_contact: lookup("SUPPORT_CONTACT").filter(|c| !c.trim().is_empty()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
