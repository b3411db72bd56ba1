pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod telemetry;

use crate::application::ingest::{IngestUseCase, SeedReport};
use crate::application::query::{QueryUseCase, StoreStats};
use crate::application::reembed::{ReembedReport, ReembedUseCase};
use crate::application::search::SearchUseCase;
use crate::config::{EmbeddingSettings, EngineOptions, ProviderKind, Settings, StoreBackend};
use crate::domain::entities::writer::{NewWriter, SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::vector_store::{VectorStore, WriterFilter};
use crate::domain::values::metric::DistanceMetric;
use crate::infrastructure::embeddings::hashing::HashingProvider;
use crate::infrastructure::embeddings::openai::OpenAiProvider;
use crate::infrastructure::memory::vector_store::InMemoryVectorStore;
use crate::infrastructure::redis::vector_store::RedisVectorStore;
use crate::infrastructure::retry::RetryConfig;
use crate::infrastructure::sqlite::vector_store::SqliteVectorStore;
use std::sync::Arc;
use tracing::info;

/// Semantic search over writers. One instance per process, built with
/// [`WriterSearch::connect`] or from explicit components in tests.
pub struct WriterSearch {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
    ingest_uc: IngestUseCase,
    reembed_uc: ReembedUseCase,
    search_uc: SearchUseCase,
    query_uc: QueryUseCase,
}

impl WriterSearch {
    pub async fn connect(settings: &Settings) -> Result<Self, DomainError> {
        let embedder = build_embedder(&settings.embedding, settings.dimension)?;

        let store: Arc<dyn VectorStore> = match settings.backend {
            StoreBackend::Sqlite => {
                Arc::new(SqliteVectorStore::open(&settings.db_path, settings.dimension)?)
            }
            StoreBackend::Redis => {
                let retry = RetryConfig::new().with_max_retries(settings.connect_retries);
                let store =
                    RedisVectorStore::connect(settings.redis.clone(), settings.dimension, &retry)
                        .await?;
                store.ensure_index().await?;
                Arc::new(store)
            }
            StoreBackend::Memory => Arc::new(InMemoryVectorStore::new(settings.dimension)),
        };

        info!(
            backend = store.backend(),
            dimension = settings.dimension,
            model = %embedder.model_version(),
            "Writer search ready"
        );
        Self::with_components(store, embedder, settings.engine.clone())
    }

    pub fn with_components(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> Result<Self, DomainError> {
        if embedder.dimension() != store.dimension() {
            return Err(DomainError::Validation(format!(
                "Embedding provider produces dimension {} but the store holds dimension {}",
                embedder.dimension(),
                store.dimension()
            )));
        }
        if options.concurrency == 0 {
            return Err(DomainError::Validation("Concurrency must be at least 1".into()));
        }

        Ok(Self {
            ingest_uc: IngestUseCase::new(store.clone(), embedder.clone(), options.clone()),
            reembed_uc: ReembedUseCase::new(store.clone(), embedder.clone(), options.clone()),
            search_uc: SearchUseCase::new(store.clone(), embedder.clone(), options.timeout),
            query_uc: QueryUseCase::new(store.clone(), options.timeout),
            store,
            embedder,
            options,
        })
    }

    // Delegating methods
    pub async fn search(
        &self,
        vector: Vec<f32>,
        k: usize,
        metric: DistanceMetric,
        filter: WriterFilter,
    ) -> Result<Vec<SearchHit>, DomainError> {
        self.search_uc.search(vector, k, metric, filter).await
    }

    pub async fn search_text(
        &self,
        text: &str,
        k: usize,
        metric: DistanceMetric,
        filter: WriterFilter,
    ) -> Result<Vec<SearchHit>, DomainError> {
        self.search_uc.search_text(text, k, metric, filter).await
    }

    pub async fn filter(&self, filter: WriterFilter) -> Result<Vec<WriterSummary>, DomainError> {
        self.search_uc.filter(filter).await
    }

    pub async fn reembed_batch(&self, batch_size: usize) -> Result<ReembedReport, DomainError> {
        self.reembed_uc.execute(batch_size).await
    }

    /// Re-embed with the configured batch size.
    pub async fn reembed(&self) -> Result<ReembedReport, DomainError> {
        self.reembed_uc.execute(self.options.batch_size).await
    }

    pub async fn seed(&self, records: Vec<NewWriter>) -> Result<SeedReport, DomainError> {
        self.ingest_uc.seed(records).await
    }

    pub async fn upsert(&self, id: i64, record: NewWriter) -> Result<Writer, DomainError> {
        self.ingest_uc.upsert(id, record).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError> {
        self.query_uc.get(id).await
    }

    pub async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError> {
        self.query_uc.scan(offset, limit).await
    }

    pub async fn stats(&self) -> Result<StoreStats, DomainError> {
        self.query_uc.stats(self.embedder.model_version()).await
    }

    pub async fn create_index(&self) -> Result<(), DomainError> {
        self.store.ensure_index().await
    }

    pub fn dimension(&self) -> usize {
        self.store.dimension()
    }

    pub async fn disconnect(self) -> Result<(), DomainError> {
        self.store.disconnect().await
    }
}

/// Pick the embedding provider named in the settings.
pub fn build_embedder(
    settings: &EmbeddingSettings,
    dimension: usize,
) -> Result<Arc<dyn EmbeddingProvider>, DomainError> {
    let embedder: Arc<dyn EmbeddingProvider> = match settings.provider {
        ProviderKind::Hashing => Arc::new(HashingProvider::new(dimension)),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            settings.api_key.clone(),
            settings.model.clone(),
            settings.base_url.clone(),
            dimension,
        )),
        #[cfg(feature = "local-embeddings")]
        ProviderKind::Local => Arc::new(
            crate::infrastructure::embeddings::local::LocalProvider::new()?,
        ),
        #[cfg(not(feature = "local-embeddings"))]
        ProviderKind::Local => {
            return Err(DomainError::Config(
                "The local provider needs the `local-embeddings` feature".into(),
            ))
        }
    };
    Ok(embedder)
}
