use crate::application::deadline::with_timeout;
use crate::application::embed::embed_text;
use crate::config::EngineOptions;
use crate::domain::entities::writer::Writer;
use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use crate::domain::ports::vector_store::VectorStore;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct ReembedFailure {
    pub id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReembedReport {
    pub scanned: usize,
    pub reembedded: usize,
    /// Writers the staleness policy left alone.
    pub fresh: usize,
    pub failures: Vec<ReembedFailure>,
}

impl ReembedReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum Outcome {
    Updated,
    EmbedFailed(DomainError),
}

pub struct ReembedUseCase {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
}

impl ReembedUseCase {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> Self {
        Self { store, embedder, options }
    }

    /// Page through the store by id and refresh stale vectors.
    ///
    /// A provider failure for one writer is logged and reported; the pass
    /// carries on. Store failures end the pass with an error.
    pub async fn execute(&self, batch_size: usize) -> Result<ReembedReport, DomainError> {
        if batch_size == 0 {
            return Err(DomainError::Validation("Batch size must be at least 1".into()));
        }

        let model_version = self.embedder.model_version();
        let policy = self.options.staleness;
        info!(batch_size, policy = %policy, model = %model_version, "Re-embedding writers");

        let mut report = ReembedReport::default();
        let mut offset = 0;
        loop {
            let page = with_timeout(
                self.options.timeout,
                "store scan",
                self.store.scan(offset, batch_size),
            )
            .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            report.scanned += page.len();

            let (stale, fresh): (Vec<Writer>, Vec<Writer>) = page
                .into_iter()
                .partition(|w| policy.needs_embedding(w, &model_version));
            report.fresh += fresh.len();

            let outcomes: Vec<(i64, Result<Outcome, DomainError>)> = stream::iter(stale)
                .map(|writer| async move { (writer.id, self.refresh(&writer).await) })
                .buffer_unordered(self.options.concurrency.max(1))
                .collect()
                .await;

            for (id, outcome) in outcomes {
                match outcome? {
                    Outcome::Updated => report.reembedded += 1,
                    Outcome::EmbedFailed(e) => {
                        warn!(id, error = %e, "Could not re-embed writer");
                        report.failures.push(ReembedFailure {
                            id,
                            error: e.to_string(),
                        });
                    }
                }
            }
            debug!(offset, reembedded = report.reembedded, "Page done");
        }

        info!(
            scanned = report.scanned,
            reembedded = report.reembedded,
            fresh = report.fresh,
            failed = report.failures.len(),
            "Re-embedding finished"
        );
        Ok(report)
    }

    async fn refresh(&self, writer: &Writer) -> Result<Outcome, DomainError> {
        let (vector, marker) =
            match embed_text(self.embedder.as_ref(), &writer.description, self.options.timeout).await {
                Ok(embedded) => embedded,
                Err(e) => return Ok(Outcome::EmbedFailed(e)),
            };
        let updated = writer.with_embedding(vector, marker);
        with_timeout(self.options.timeout, "store put", self.store.put(&updated)).await?;
        Ok(Outcome::Updated)
    }
}
