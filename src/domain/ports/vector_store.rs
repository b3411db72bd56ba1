use crate::domain::entities::writer::{NewWriter, SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::values::metric::DistanceMetric;

/// Keyword filter over writer metadata. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct WriterFilter {
    /// Notable works containing this title.
    pub work: Option<String>,
    /// Description containing this text.
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl WriterFilter {
    pub fn by_work(work: impl Into<String>) -> Self {
        Self {
            work: Some(work.into()),
            ..Default::default()
        }
    }

    pub fn is_match_all(&self) -> bool {
        self.work.is_none() && self.text.is_none()
    }

    /// In-process evaluation, used by the in-memory store and as the KNN pre-filter there.
    pub fn matches(&self, writer: &WriterSummary) -> bool {
        let work_ok = self.work.as_ref().map_or(true, |w| {
            let w = w.to_lowercase();
            writer.notable_works.iter().any(|t| t.to_lowercase().contains(&w))
        });
        let text_ok = self.text.as_ref().map_or(true, |t| {
            writer.description.to_lowercase().contains(&t.to_lowercase())
        });
        work_ok && text_ok
    }
}

/// A validated nearest-neighbour request handed to the backing store.
#[derive(Debug, Clone)]
pub struct KnnQuery {
    pub vector: Vec<f32>,
    pub k: usize,
    pub metric: DistanceMetric,
    pub filter: WriterFilter,
}

#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and stats.
    fn backend(&self) -> &'static str;

    fn dimension(&self) -> usize;

    /// Insert or replace the writer at `writer.id`. Metadata, vector and
    /// marker become visible together.
    async fn put(&self, writer: &Writer) -> Result<(), DomainError>;

    /// Assign a fresh id and store the record with its vector.
    async fn insert(
        &self,
        record: NewWriter,
        embedding: Vec<f32>,
        embedding_marker: Option<String>,
    ) -> Result<Writer, DomainError>;

    async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError>;

    /// Page of writers ordered by id ascending.
    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError>;

    async fn count(&self) -> Result<usize, DomainError>;

    /// Up to `query.k` hits ordered by distance, ties by ascending id.
    async fn knn(&self, query: &KnnQuery) -> Result<Vec<SearchHit>, DomainError>;

    async fn filter(&self, filter: &WriterFilter) -> Result<Vec<WriterSummary>, DomainError>;

    /// Create whatever search index the backend needs. Idempotent.
    async fn ensure_index(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
