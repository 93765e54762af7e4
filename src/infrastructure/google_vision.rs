use crate::domain::labeling_service::{LabelError, LabelingService};
use crate::infrastructure::google_auth::TokenSource;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com";

pub struct GoogleVisionLabeler {
    client: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl GoogleVisionLabeler {
    pub fn new(client: reqwest::Client, endpoint: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Vec<EntityAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct EntityAnnotation {
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    code: i32,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl LabelingService for GoogleVisionLabeler {
    async fn detect_labels(&self, image: &[u8]) -> Result<Vec<String>, LabelError> {
        let token = self.tokens.access_token().await?;

        let body = json!({
            "requests": [{
                "image": { "content": general_purpose::STANDARD.encode(image) },
                "features": [{ "type": "LABEL_DETECTION" }]
            }]
        });

        let response = self
            .client
            .post(format!("{}/v1/images:annotate", self.endpoint))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LabelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LabelError::Request(format!("Vision API returned {status}: {text}")));
        }

        let parsed: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| LabelError::Request(e.to_string()))?;

        // One image in the request, so at most one entry back.
        let Some(result) = parsed.responses.into_iter().next() else {
            return Ok(Vec::new());
        };

        if let Some(err) = result.error {
            return Err(LabelError::Rejected(format!("{} (code {})", err.message, err.code)));
        }

        Ok(result
            .label_annotations
            .into_iter()
            .map(|label| label.description)
            .collect())
    }
}
