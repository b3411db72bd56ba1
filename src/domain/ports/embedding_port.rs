use crate::domain::error::DomainError;

#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError>;
    fn dimension(&self) -> usize;
    /// Identifies the model so stored vectors can be checked for staleness.
    fn model_version(&self) -> String;
}
