//! Shared test helpers.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use writer_vss::config::EngineOptions;
use writer_vss::domain::entities::writer::{NewWriter, Writer};
use writer_vss::domain::error::DomainError;
use writer_vss::domain::ports::embedding_port::EmbeddingProvider;
use writer_vss::domain::ports::vector_store::VectorStore;
use writer_vss::infrastructure::dataset::load_dataset;
use writer_vss::infrastructure::embeddings::hashing::HashingProvider;
use writer_vss::infrastructure::memory::vector_store::InMemoryVectorStore;
use writer_vss::infrastructure::sqlite::vector_store::SqliteVectorStore;
use writer_vss::WriterSearch;

pub const DIM: usize = 384;

pub fn options() -> EngineOptions {
    EngineOptions {
        batch_size: 2,
        concurrency: 3,
        timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

pub fn sqlite_store(dim: usize) -> Arc<dyn VectorStore> {
    Arc::new(SqliteVectorStore::open(":memory:", dim).unwrap())
}

pub fn memory_store(dim: usize) -> Arc<dyn VectorStore> {
    Arc::new(InMemoryVectorStore::new(dim))
}

pub fn engine_on(store: Arc<dyn VectorStore>) -> WriterSearch {
    let dim = store.dimension();
    WriterSearch::with_components(store, Arc::new(HashingProvider::new(dim)), options()).unwrap()
}

pub fn setup() -> WriterSearch {
    engine_on(sqlite_store(DIM))
}

pub fn record(name: &str, works: &[&str], description: &str) -> NewWriter {
    NewWriter {
        full_name: name.to_string(),
        notable_works: works.iter().map(|w| w.to_string()).collect(),
        description: description.to_string(),
    }
}

pub fn writer(id: i64, name: &str, embedding: Vec<f32>) -> Writer {
    Writer::new(
        id,
        record(name, &["Some Book"], &format!("{name} wrote books")),
        embedding,
        None,
    )
}

pub fn dataset() -> Vec<NewWriter> {
    load_dataset(concat!(env!("CARGO_MANIFEST_DIR"), "/data/writers.json")).unwrap()
}

/// Hashing embeddings, except that any text containing `poison` fails.
pub struct FlakyProvider {
    inner: HashingProvider,
    poison: String,
}

impl FlakyProvider {
    pub fn new(dim: usize, poison: &str) -> Self {
        Self {
            inner: HashingProvider::new(dim),
            poison: poison.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        if texts.iter().any(|t| t.contains(&self.poison)) {
            return Err(DomainError::Embedding("provider rejected the text".into()));
        }
        self.inner.embed(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_version(&self) -> String {
        self.inner.model_version()
    }
}

/// Never answers within a test's patience.
pub struct StalledProvider {
    pub dim: usize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for StalledProvider {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(vec![])
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_version(&self) -> String {
        "stalled".into()
    }
}
