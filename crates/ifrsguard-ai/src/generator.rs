use async_trait::async_trait;
use ifrsguard_core::Passage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("generator returned an empty draft")]
    Empty,
    #[error("generator unavailable: {0}")]
    Unavailable(String),
}

/// Language synthesis over retrieved passages.
///
/// Implementations may be slow or unreliable. An `Err` is treated by the
/// engine as an evidence shortfall, never surfaced to the caller.
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, passages: &[Passage]) -> Result<String, GenerateError>;
}
