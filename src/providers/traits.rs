use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("embedding provider rejected the request ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("malformed embedding response: {0}")]
    Response(String),
}

/// A remote service that turns a batch of texts into one vector per text.
///
/// Implementations make exactly one network call per `embed_batch` invocation
/// and return vectors in the same positional order as the input. Callers are
/// responsible for never passing an empty batch.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Vector width produced by the configured model.
    fn dimension(&self) -> usize;
}
