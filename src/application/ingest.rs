use crate::application::deadline::with_timeout;
use crate::application::embed::embed_text;
use crate::config::EngineOptions;
use crate::domain::entities::writer::{NewWriter, Writer};
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::vector_store::VectorStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A dataset record that could not be stored.
#[derive(Debug, Clone, Serialize)]
pub struct SeedFailure {
    /// Position in the input dataset.
    pub index: usize,
    pub full_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub inserted: usize,
    pub ids: Vec<i64>,
    pub failures: Vec<SeedFailure>,
}

pub struct IngestUseCase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
}

impl IngestUseCase {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> Self {
        Self { store, embedder, options }
    }

    /// Embed and insert every record. Embedding runs concurrently but inserts
    /// happen in dataset order, so ids follow the input. A record that fails
    /// validation or embedding is reported; a store failure aborts the seed.
    pub async fn seed(&self, records: Vec<NewWriter>) -> Result<SeedReport, DomainError> {
        let total = records.len();
        info!(total, "Seeding writers");

        let embedded: Vec<(usize, NewWriter, Result<(Vec<f32>, String), DomainError>)> =
            stream::iter(records.into_iter().enumerate())
                .map(|(index, record)| async move {
                    let result = match record.validate() {
                        Ok(()) => {
                            embed_text(self.embedder.as_ref(), &record.description, self.options.timeout)
                                .await
                        }
                        Err(msg) => Err(DomainError::Validation(msg)),
                    };
                    (index, record, result)
                })
                .buffered(self.options.concurrency.max(1))
                .collect()
                .await;

        let mut report = SeedReport::default();
        for (index, record, result) in embedded {
            match result {
                Ok((vector, marker)) => {
                    let name = record.full_name.clone();
                    let writer = with_timeout(
                        self.options.timeout,
                        "store insert",
                        self.store.insert(record, vector, Some(marker)),
                    )
                    .await?;
                    debug!(id = writer.id, name = %name, "Inserted writer");
                    report.inserted += 1;
                    report.ids.push(writer.id);
                }
                Err(e) => {
                    warn!(index, name = %record.full_name, error = %e, "Skipping writer");
                    report.failures.push(SeedFailure {
                        index,
                        full_name: record.full_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(inserted = report.inserted, failed = report.failures.len(), "Seed finished");
        Ok(report)
    }

    /// Replace the writer at `id` with `record`, re-embedding its description.
    /// Metadata, vector and marker are written by a single `put`.
    pub async fn upsert(&self, id: i64, record: NewWriter) -> Result<Writer, DomainError> {
        if id <= 0 {
            return Err(DomainError::Validation(format!("Writer id must be positive, got {id}")));
        }
        record.validate().map_err(DomainError::Validation)?;
        let (vector, marker) =
            embed_text(self.embedder.as_ref(), &record.description, self.options.timeout).await?;
        let writer = Writer::new(id, record, vector, Some(marker));
        with_timeout(self.options.timeout, "store put", self.store.put(&writer)).await?;
        info!(id, "Upserted writer");
        Ok(writer)
    }
}
