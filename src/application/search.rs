use crate::application::deadline::with_timeout;
use crate::application::embed::embed_text;
use crate::domain::entities::writer::{SearchHit, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::vector_store::{KnnQuery, VectorStore, WriterFilter};
use crate::domain::values::metric::DistanceMetric;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

pub struct SearchUseCase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    timeout: Duration,
}

impl SearchUseCase {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        timeout: Duration,
    ) -> Self {
        Self { store, embedder, timeout }
    }

    /// The `k` nearest writers to `vector`, closest first, ties by id.
    pub async fn search(
        &self,
        vector: Vec<f32>,
        k: usize,
        metric: DistanceMetric,
        filter: WriterFilter,
    ) -> Result<Vec<SearchHit>, DomainError> {
        if k == 0 {
            return Err(DomainError::Validation("k must be at least 1".into()));
        }
        if vector.len() != self.store.dimension() {
            return Err(DomainError::Validation(format!(
                "Query vector has dimension {}, store expects {}",
                vector.len(),
                self.store.dimension()
            )));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(DomainError::Validation("Query vector contains NaN or infinity".into()));
        }

        let query = KnnQuery { vector, k, metric, filter };
        let mut hits = with_timeout(self.timeout, "knn search", self.store.knn(&query)).await?;

        // Same (distance, id) order on every backend.
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.writer.id.cmp(&b.writer.id))
        });
        hits.truncate(k);
        debug!(k, metric = %metric, returned = hits.len(), "KNN search");
        Ok(hits)
    }

    /// Embed `text` with the provider, then search with its vector.
    pub async fn search_text(
        &self,
        text: &str,
        k: usize,
        metric: DistanceMetric,
        filter: WriterFilter,
    ) -> Result<Vec<SearchHit>, DomainError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation("Query text is empty".into()));
        }
        if k == 0 {
            return Err(DomainError::Validation("k must be at least 1".into()));
        }
        let (vector, _) = embed_text(self.embedder.as_ref(), text, self.timeout).await?;
        self.search(vector, k, metric, filter).await
    }

    pub async fn filter(&self, filter: WriterFilter) -> Result<Vec<WriterSummary>, DomainError> {
        if filter.limit == Some(0) {
            return Err(DomainError::Validation("Limit must be at least 1".into()));
        }
        with_timeout(self.timeout, "keyword filter", self.store.filter(&filter)).await
    }
}
