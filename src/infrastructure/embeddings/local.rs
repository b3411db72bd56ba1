use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};

const LOCAL_DIMENSION: usize = 384;

/// In-process AllMiniLM-L6-v2 via fastembed. The model is downloaded to the
/// fastembed cache on first use.
pub struct LocalProvider {
    model: Arc<Mutex<TextEmbedding>>,
}

impl LocalProvider {
    pub fn new() -> Result<Self, DomainError> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false),
        )
        .map_err(|e| DomainError::Embedding(format!("Failed to initialize embedding model: {e}")))?;
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
        })
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = Arc::clone(&self.model);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || {
            model
                .lock()
                .map_err(|_| DomainError::Embedding("Embedding model lock poisoned".to_string()))?
                .embed(texts, None)
                .map_err(|e| DomainError::Embedding(format!("Failed to generate embeddings: {e}")))
        })
        .await
        .map_err(|e| DomainError::Embedding(format!("Embedding task failed: {e}")))?
    }

    fn dimension(&self) -> usize {
        LOCAL_DIMENSION
    }

    fn model_version(&self) -> String {
        "fastembed:all-minilm-l6-v2".to_string()
    }
}
