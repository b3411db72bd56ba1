use crate::config::RedisSettings;
use crate::domain::entities::writer::{NewWriter, SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::{KnnQuery, VectorStore, WriterFilter};
use crate::domain::values::metric::{norm, DistanceMetric};
use crate::domain::values::vector_blob;
use crate::infrastructure::redis::command::{self, CommandArgs, DEFAULT_FILTER_LIMIT};
use crate::infrastructure::redis::connector::connect_with_retry;
use crate::infrastructure::retry::RetryConfig;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tracing::{debug, info};

/// Writers stored as RedisJSON documents under `<prefix><id>` and searched
/// through a RediSearch vector index.
pub struct RedisVectorStore {
    conn: MultiplexedConnection,
    settings: RedisSettings,
    dimension: usize,
}

impl RedisVectorStore {
    pub async fn connect(
        settings: RedisSettings,
        dimension: usize,
        retry: &RetryConfig,
    ) -> Result<Self, DomainError> {
        let conn = connect_with_retry(&settings.url, retry).await?;
        Ok(Self {
            conn,
            settings,
            dimension,
        })
    }

    fn key(&self, id: i64) -> String {
        format!("{}{id}", self.settings.prefix)
    }

    fn id_counter_key(&self) -> String {
        format!("{}next_id", self.settings.prefix)
    }

    async fn run(&self, cmd: &CommandArgs) -> Result<Value, DomainError> {
        let mut conn = self.conn.clone();
        let value: Value = cmd.to_cmd().query_async(&mut conn).await?;
        Ok(value)
    }

    fn document(writer: &Writer) -> Result<String, DomainError> {
        serde_json::to_string(writer)
            .map_err(|e| DomainError::Parse(format!("Cannot encode writer {}: {e}", writer.id)))
    }

    /// Walk documents in id order until `k` writers with a vector are found.
    async fn zero_norm_knn(&self, query: &KnnQuery) -> Result<Vec<SearchHit>, DomainError> {
        let mut hits = Vec::with_capacity(query.k);
        let mut offset = 0;
        while hits.len() < query.k {
            let page = self.search_documents(&query.filter, offset, query.k).await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            hits.extend(zero_norm_hits(&page, query.k - hits.len()));
        }
        Ok(hits)
    }

    async fn search_documents(
        &self,
        filter: &WriterFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Writer>, DomainError> {
        let cmd = command::document_search(&self.settings.index, filter, offset, limit);
        let reply = command::parse_search_reply(&self.run(&cmd).await?)?;
        command::writers_from_reply(&reply)
    }
}

/// How a KNN request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnnPlan {
    /// Ask RediSearch.
    Engine,
    /// Cosine against a zero vector: every document sits at distance 1.0,
    /// which RediSearch does not define, so the first writers by id answer.
    ZeroNormById,
}

/// The index ranks by one metric only; anything else is refused.
pub fn plan_knn(
    index: &str,
    index_metric: DistanceMetric,
    query: &KnnQuery,
) -> Result<KnnPlan, DomainError> {
    if query.metric != index_metric {
        return Err(DomainError::Validation(format!(
            "Index {index} ranks by {index_metric}, not {}",
            query.metric
        )));
    }
    if query.metric == DistanceMetric::Cosine && norm(&query.vector) == 0.0 {
        return Ok(KnnPlan::ZeroNormById);
    }
    Ok(KnnPlan::Engine)
}

/// `FT.CREATE` on an existing index fails with "Index already exists"; the
/// client may render the error code apart from its detail.
pub fn index_already_exists(err: &DomainError) -> bool {
    matches!(err, DomainError::Database(msg) if msg.contains("already exists"))
}

/// Up to `take` hits at distance 1.0 from writers that carry a vector.
pub fn zero_norm_hits(writers: &[Writer], take: usize) -> Vec<SearchHit> {
    writers
        .iter()
        .filter(|w| w.has_embedding())
        .take(take)
        .map(|w| SearchHit {
            distance: 1.0,
            writer: w.summary(),
        })
        .collect()
}

#[async_trait::async_trait]
impl VectorStore for RedisVectorStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn put(&self, writer: &Writer) -> Result<(), DomainError> {
        vector_blob::check_dimension(&writer.embedding, self.dimension)
            .map_err(DomainError::Validation)?;
        let body = Self::document(writer)?;
        let mut conn = self.conn.clone();
        // Single JSON.SET: metadata and vector are replaced together.
        let _: String = redis::cmd("JSON.SET")
            .arg(self.key(writer.id))
            .arg("$")
            .arg(body)
            .query_async(&mut conn)
            .await?;
        debug!(id = writer.id, "Stored writer");
        Ok(())
    }

    async fn insert(
        &self,
        record: NewWriter,
        embedding: Vec<f32>,
        embedding_marker: Option<String>,
    ) -> Result<Writer, DomainError> {
        vector_blob::check_dimension(&embedding, self.dimension).map_err(DomainError::Validation)?;
        let mut conn = self.conn.clone();
        let mut writer = Writer::new(0, record, embedding, embedding_marker);
        loop {
            writer.id = redis::cmd("INCR")
                .arg(self.id_counter_key())
                .query_async(&mut conn)
                .await?;
            // NX: an id taken by an explicit put is skipped, never overwritten.
            let created: Option<String> = redis::cmd("JSON.SET")
                .arg(self.key(writer.id))
                .arg("$")
                .arg(Self::document(&writer)?)
                .arg("NX")
                .query_async(&mut conn)
                .await?;
            if created.is_some() {
                return Ok(writer);
            }
            debug!(id = writer.id, "Id already in use, drawing another");
        }
    }

    async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError> {
        let mut conn = self.conn.clone();
        let body: Option<String> = redis::cmd("JSON.GET")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await?;
        body.map(|b| {
            serde_json::from_str(&b)
                .map_err(|e| DomainError::Parse(format!("Bad document for writer {id}: {e}")))
        })
        .transpose()
    }

    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError> {
        self.search_documents(&WriterFilter::default(), offset, limit).await
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let reply = command::parse_search_reply(
            &self.run(&command::count_search(&self.settings.index)).await?,
        )?;
        Ok(reply.total.max(0) as usize)
    }

    async fn knn(&self, query: &KnnQuery) -> Result<Vec<SearchHit>, DomainError> {
        match plan_knn(&self.settings.index, self.settings.metric, query)? {
            KnnPlan::ZeroNormById => self.zero_norm_knn(query).await,
            KnnPlan::Engine => {
                let cmd = command::knn_search(
                    &self.settings.index,
                    &query.vector,
                    query.k,
                    &query.filter,
                );
                let reply = command::parse_search_reply(&self.run(&cmd).await?)?;
                let mut hits = command::hits_from_reply(&reply, query.metric)?;
                hits.sort_by(|a, b| {
                    a.distance
                        .total_cmp(&b.distance)
                        .then(a.writer.id.cmp(&b.writer.id))
                });
                hits.truncate(query.k);
                Ok(hits)
            }
        }
    }

    async fn filter(&self, filter: &WriterFilter) -> Result<Vec<WriterSummary>, DomainError> {
        let limit = filter.limit.unwrap_or(DEFAULT_FILTER_LIMIT);
        let writers = self.search_documents(filter, 0, limit).await?;
        Ok(writers.iter().map(Writer::summary).collect())
    }

    /// Create the vector index unless it already exists.
    async fn ensure_index(&self) -> Result<(), DomainError> {
        let cmd = command::create_index(
            &self.settings.index,
            &self.settings.prefix,
            self.dimension,
            self.settings.metric,
        );
        match self.run(&cmd).await {
            Ok(_) => {
                info!(index = %self.settings.index, "Created vector index");
                Ok(())
            }
            Err(e) if index_already_exists(&e) => {
                debug!(index = %self.settings.index, "Vector index already exists");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn disconnect(&self) -> Result<(), DomainError> {
        info!("Releasing Redis connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(vector: Vec<f32>, metric: DistanceMetric) -> KnnQuery {
        KnnQuery {
            vector,
            k: 2,
            metric,
            filter: WriterFilter::default(),
        }
    }

    fn writer(id: i64, embedding: Vec<f32>) -> Writer {
        let record = NewWriter {
            full_name: format!("W{id}"),
            notable_works: vec![],
            description: "text".into(),
        };
        Writer::new(id, record, embedding, None)
    }

    #[test]
    fn test_metric_must_match_index() {
        let err = plan_knn("idx", DistanceMetric::Cosine, &query(vec![1.0, 0.0], DistanceMetric::L2))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(ref m) if m.contains("idx")));
        assert_eq!(
            plan_knn("idx", DistanceMetric::L2, &query(vec![1.0, 0.0], DistanceMetric::L2)).unwrap(),
            KnnPlan::Engine
        );
    }

    #[test]
    fn test_zero_vector_cosine_skips_engine() {
        assert_eq!(
            plan_knn("idx", DistanceMetric::Cosine, &query(vec![0.0, 0.0], DistanceMetric::Cosine))
                .unwrap(),
            KnnPlan::ZeroNormById
        );
        // L2 to the origin is well defined.
        assert_eq!(
            plan_knn("idx", DistanceMetric::L2, &query(vec![0.0, 0.0], DistanceMetric::L2)).unwrap(),
            KnnPlan::Engine
        );
    }

    #[test]
    fn test_existing_index_is_recognised() {
        assert!(index_already_exists(&DomainError::Database("Index already exists".into())));
        assert!(index_already_exists(&DomainError::Database("Index: already exists".into())));
        assert!(!index_already_exists(&DomainError::Database("Unknown index name".into())));
        assert!(!index_already_exists(&DomainError::Connection("Index already exists".into())));
    }

    #[test]
    fn test_zero_norm_hits_skip_writers_without_vectors() {
        let page = vec![writer(1, vec![]), writer(2, vec![1.0]), writer(3, vec![]), writer(4, vec![0.5])];
        let hits = zero_norm_hits(&page, 5);
        assert_eq!(hits.iter().map(|h| h.writer.id).collect::<Vec<_>>(), vec![2, 4]);
        assert!(hits.iter().all(|h| h.distance == 1.0));
        assert_eq!(zero_norm_hits(&page, 1).len(), 1);
    }
}
