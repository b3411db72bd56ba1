use crate::application::deadline::with_timeout;
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::values::staleness::embedding_marker;
use std::time::Duration;

/// Embed one text and return the vector with its staleness marker.
/// The provider's answer must hold exactly one vector of the provider's dimension.
pub async fn embed_text(
    embedder: &dyn EmbeddingProvider,
    text: &str,
    timeout: Duration,
) -> Result<(Vec<f32>, String), DomainError> {
    let texts = [text.to_string()];
    let mut vectors = with_timeout(timeout, "embedding request", embedder.embed(&texts)).await?;
    if vectors.len() != 1 {
        return Err(DomainError::Embedding(format!(
            "Provider returned {} vectors for 1 text",
            vectors.len()
        )));
    }
    let vector = vectors.remove(0);
    if vector.len() != embedder.dimension() {
        return Err(DomainError::Embedding(format!(
            "Provider returned dimension {}, expected {}",
            vector.len(),
            embedder.dimension()
        )));
    }
    let marker = embedding_marker(&embedder.model_version(), text);
    Ok((vector, marker))
}
