use crate::domain::labeling_service::LabelError;
use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::Mutex;

const VISION_SCOPE: &str = "https://www.googleapis.com/auth/cloud-vision";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Source of OAuth bearer tokens for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, LabelError>;
}

/// The subset of a service-account JSON key file the token exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

/// Exchanges a signed service-account assertion for an access token and
/// caches it until shortly before it expires.
pub struct ServiceAccountTokens {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokens {
    pub fn new(key: ServiceAccountKey, client: reqwest::Client) -> Result<Self, LabelError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| LabelError::Credentials(format!("invalid private key: {e}")))?;

        Ok(Self {
            key,
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub async fn from_file(path: &Path, client: reqwest::Client) -> Result<Self, LabelError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            LabelError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
            LabelError::Credentials(format!("malformed key file {}: {e}", path.display()))
        })?;
        Self::new(key, client)
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    fn sign_assertion(&self, now: i64) -> Result<String, LabelError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: VISION_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| LabelError::Credentials(e.to_string()))
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn access_token(&self) -> Result<String, LabelError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now().timestamp();

        if let Some(token) = cached.as_ref() {
            if token.expires_at - EXPIRY_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let assertion = self.sign_assertion(now)?;
        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| LabelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LabelError::Credentials(format!(
                "token exchange returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| LabelError::Credentials(e.to_string()))?;

        log::debug!(
            "Obtained access token for {}, valid for {}s",
            self.key.client_email,
            token.expires_in
        );

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });
        Ok(token.access_token)
    }
}
