use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Image download failed: {0}")]
    Download(String),

    #[error("Labeling request failed: {0}")]
    Request(String),

    #[error("Labeling service rejected the image: {0}")]
    Rejected(String),

    #[error("Credential error: {0}")]
    Credentials(String),
}

#[async_trait]
pub trait LabelingService: Send + Sync {
    /// Returns the label descriptions in the order the service ranked them.
    async fn detect_labels(&self, image: &[u8]) -> Result<Vec<String>, LabelError>;
}
