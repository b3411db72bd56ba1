use crate::application::deadline::with_timeout;
use crate::domain::entities::writer::Writer;
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::VectorStore;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub backend: String,
    pub dimension: usize,
    pub total_writers: usize,
    pub embedding_model: String,
}

pub struct QueryUseCase {
    store: Arc<dyn VectorStore>,
    timeout: Duration,
}

impl QueryUseCase {
    pub fn new(store: Arc<dyn VectorStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError> {
        with_timeout(self.timeout, "store get", self.store.get(id)).await
    }

    pub async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError> {
        if limit == 0 {
            return Err(DomainError::Validation("Limit must be at least 1".into()));
        }
        with_timeout(self.timeout, "store scan", self.store.scan(offset, limit)).await
    }

    pub async fn stats(&self, embedding_model: String) -> Result<StoreStats, DomainError> {
        let total_writers = with_timeout(self.timeout, "store count", self.store.count()).await?;
        Ok(StoreStats {
            backend: self.store.backend().to_string(),
            dimension: self.store.dimension(),
            total_writers,
            embedding_model,
        })
    }
}
