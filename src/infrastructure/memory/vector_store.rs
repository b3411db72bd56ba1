use crate::domain::entities::writer::{NewWriter, SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::{KnnQuery, VectorStore, WriterFilter};
use crate::domain::values::vector_blob;
use std::collections::BTreeMap;
use std::sync::RwLock;

#[derive(Default)]
struct State {
    writers: BTreeMap<i64, Writer>,
    last_id: i64,
}

/// Process-local store. Ranking is done in application code by a full scan,
/// which makes it the reference for the engine-backed stores.
pub struct InMemoryVectorStore {
    state: RwLock<State>,
    dimension: usize,
}

impl InMemoryVectorStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            state: RwLock::new(State::default()),
            dimension,
        }
    }

    fn poisoned<E: std::fmt::Display>(e: E) -> DomainError {
        DomainError::Database(format!("In-memory store lock poisoned: {e}"))
    }
}

#[async_trait::async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn put(&self, writer: &Writer) -> Result<(), DomainError> {
        vector_blob::check_dimension(&writer.embedding, self.dimension)
            .map_err(DomainError::Validation)?;
        let mut state = self.state.write().map_err(Self::poisoned)?;
        state.last_id = state.last_id.max(writer.id);
        state.writers.insert(writer.id, writer.clone());
        Ok(())
    }

    async fn insert(
        &self,
        record: NewWriter,
        embedding: Vec<f32>,
        embedding_marker: Option<String>,
    ) -> Result<Writer, DomainError> {
        vector_blob::check_dimension(&embedding, self.dimension).map_err(DomainError::Validation)?;
        let mut state = self.state.write().map_err(Self::poisoned)?;
        state.last_id += 1;
        let writer = Writer::new(state.last_id, record, embedding, embedding_marker);
        state.writers.insert(writer.id, writer.clone());
        Ok(writer)
    }

    async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state.writers.get(&id).cloned())
    }

    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state.writers.values().skip(offset).take(limit).cloned().collect())
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state.writers.len())
    }

    async fn knn(&self, query: &KnnQuery) -> Result<Vec<SearchHit>, DomainError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        let mut hits: Vec<SearchHit> = state
            .writers
            .values()
            .filter(|w| w.has_embedding())
            .map(|w| (w, w.summary()))
            .filter(|(_, s)| query.filter.matches(s))
            .map(|(w, summary)| SearchHit {
                distance: query.metric.distance(&query.vector, &w.embedding),
                writer: summary,
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.writer.id.cmp(&b.writer.id))
        });
        hits.truncate(query.k);
        Ok(hits)
    }

    async fn filter(&self, filter: &WriterFilter) -> Result<Vec<WriterSummary>, DomainError> {
        let state = self.state.read().map_err(Self::poisoned)?;
        Ok(state
            .writers
            .values()
            .map(Writer::summary)
            .filter(|s| filter.matches(s))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }
}
