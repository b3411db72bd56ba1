use crate::domain::entities::writer::{NewWriter, SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::{KnnQuery, VectorStore, WriterFilter};
use crate::domain::values::metric::{cosine_distance, l2_distance, DistanceMetric};
use crate::domain::values::vector_blob;
use crate::infrastructure::sqlite::migrations::{ensure_dimension, run_migrations};
use chrono::{DateTime, Utc};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use std::sync::Mutex;
use tracing::{debug, info};

/// `notable_works` as a JSON array, reading legacy plain-text rows the way
/// `parse_works` does.
const WORKS_AS_ARRAY: &str = "CASE \
    WHEN json_valid(writers.notable_works) THEN \
        CASE WHEN json_type(writers.notable_works) = 'array' \
            THEN writers.notable_works ELSE json_array(writers.notable_works) END \
    WHEN writers.notable_works = '' THEN '[]' \
    ELSE json_array(writers.notable_works) END";

const SELECT_COLS: &str = "id, full_name, notable_works, description, embedding, embedding_marker, updated_at";

/// Writers table with the embedding as a little-endian f32 blob. KNN ranking
/// runs inside SQLite through the registered `vec_distance_*` functions.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    dimension: usize,
}

impl SqliteVectorStore {
    pub fn open(path: &str, dimension: usize) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::Connection(format!("Cannot open {path}: {e}")))?;
        if path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| DomainError::Database(format!("WAL error: {e}")))?;
        }
        let store = Self::new(conn, dimension)?;
        info!(path, dimension, "Opened SQLite vector store");
        Ok(store)
    }

    pub fn new(conn: Connection, dimension: usize) -> Result<Self, DomainError> {
        run_migrations(&conn)?;
        ensure_dimension(&conn, dimension)?;
        register_distance_functions(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimension,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, DomainError> {
        self.conn
            .lock()
            .map_err(|e| DomainError::Database(e.to_string()))
    }

    fn row_to_writer(row: &rusqlite::Row) -> Result<Writer, rusqlite::Error> {
        let works_str: String = row.get(2)?;
        let blob: Option<Vec<u8>> = row.get(4)?;
        let updated_str: String = row.get(6)?;

        let embedding = match blob {
            Some(bytes) => vector_blob::decode(&bytes).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Blob,
                    e.into(),
                )
            })?,
            None => Vec::new(),
        };

        Ok(Writer {
            id: row.get(0)?,
            full_name: row.get(1)?,
            notable_works: parse_works(&works_str),
            description: row.get(3)?,
            embedding,
            embedding_marker: row.get(5)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }

    fn row_to_summary(row: &rusqlite::Row) -> Result<WriterSummary, rusqlite::Error> {
        let works_str: String = row.get(2)?;
        Ok(WriterSummary {
            id: row.get(0)?,
            full_name: row.get(1)?,
            notable_works: parse_works(&works_str),
            description: row.get(3)?,
        })
    }

    /// Appends `AND ...` clauses for the filter, binding every value. Titles
    /// are matched one by one and both sides are folded with `fold_case`, so
    /// matching agrees with `WriterFilter::matches`.
    fn push_filter(
        sql: &mut String,
        param_values: &mut Vec<Box<dyn rusqlite::types::ToSql>>,
        filter: &WriterFilter,
    ) {
        if let Some(work) = &filter.work {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM json_each({WORKS_AS_ARRAY}) AS w \
                 WHERE fold_case(w.value) LIKE ?{} ESCAPE '\\')",
                param_values.len() + 1
            ));
            param_values.push(Box::new(like_pattern(work)));
        }
        if let Some(text) = &filter.text {
            sql.push_str(&format!(
                " AND fold_case(writers.description) LIKE ?{} ESCAPE '\\'",
                param_values.len() + 1
            ));
            param_values.push(Box::new(like_pattern(text)));
        }
    }
}

fn parse_works(raw: &str) -> Vec<String> {
    // Rows written by older tooling may hold a plain string instead of a JSON array.
    serde_json::from_str(raw).unwrap_or_else(|_| {
        if raw.is_empty() {
            Vec::new()
        } else {
            vec![raw.to_string()]
        }
    })
}

/// `%<folded, escaped needle>%`
fn like_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(&needle.to_lowercase()))
}

/// SQLite integers are signed 64-bit; larger values would wrap.
fn sql_int(value: usize, what: &str) -> Result<i64, DomainError> {
    i64::try_from(value)
        .map_err(|_| DomainError::Validation(format!("{what} {value} is out of range")))
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn blob_args(ctx: &Context<'_>) -> rusqlite::Result<Option<(Vec<f32>, Vec<f32>)>> {
    let a: Option<Vec<u8>> = ctx.get(0)?;
    let b: Option<Vec<u8>> = ctx.get(1)?;
    let (Some(a), Some(b)) = (a, b) else {
        return Ok(None);
    };
    let a = vector_blob::decode(&a).map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
    let b = vector_blob::decode(&b).map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
    if a.len() != b.len() {
        return Err(rusqlite::Error::UserFunctionError(
            format!("Vector dimension mismatch: {} vs {}", a.len(), b.len()).into(),
        ));
    }
    Ok(Some((a, b)))
}

fn vec_distance_cosine(ctx: &Context<'_>) -> rusqlite::Result<Option<f64>> {
    Ok(blob_args(ctx)?.map(|(a, b)| cosine_distance(&a, &b)))
}

fn vec_distance_l2(ctx: &Context<'_>) -> rusqlite::Result<Option<f64>> {
    Ok(blob_args(ctx)?.map(|(a, b)| l2_distance(&a, &b)))
}

fn fold_case(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
    Ok(match ctx.get_raw(0) {
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).to_lowercase()),
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    })
}

/// `vec_distance_cosine(a, b)` and `vec_distance_l2(a, b)` over f32 blobs,
/// plus `fold_case(text)`, a Unicode-aware lower(). NULL in, NULL out.
pub fn register_distance_functions(conn: &Connection) -> Result<(), DomainError> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("vec_distance_cosine", 2, flags, vec_distance_cosine)?;
    conn.create_scalar_function("vec_distance_l2", 2, flags, vec_distance_l2)?;
    conn.create_scalar_function("fold_case", 1, flags, fold_case)?;
    Ok(())
}

fn sql_function(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "vec_distance_cosine",
        DistanceMetric::L2 => "vec_distance_l2",
    }
}

#[async_trait::async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn put(&self, writer: &Writer) -> Result<(), DomainError> {
        vector_blob::check_dimension(&writer.embedding, self.dimension)
            .map_err(DomainError::Validation)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO writers (id, full_name, notable_works, description, embedding, embedding_marker, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                notable_works = excluded.notable_works,
                description = excluded.description,
                embedding = excluded.embedding,
                embedding_marker = excluded.embedding_marker,
                updated_at = excluded.updated_at",
            params![
                writer.id,
                writer.full_name,
                serde_json::to_string(&writer.notable_works).unwrap_or_else(|_| "[]".into()),
                writer.description,
                vector_blob::encode(&writer.embedding),
                writer.embedding_marker,
                writer.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to store writer {}: {e}", writer.id)))?;
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
        let conn = self.lock()?;
        let updated_at = Utc::now();
        conn.execute(
            "INSERT INTO writers (full_name, notable_works, description, embedding, embedding_marker, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.full_name,
                serde_json::to_string(&record.notable_works).unwrap_or_else(|_| "[]".into()),
                record.description,
                vector_blob::encode(&embedding),
                embedding_marker,
                updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| DomainError::Database(format!("Failed to insert writer: {e}")))?;
        let id = conn.last_insert_rowid();
        let mut writer = Writer::new(id, record, embedding, embedding_marker);
        writer.updated_at = updated_at;
        Ok(writer)
    }

    async fn get(&self, id: i64) -> Result<Option<Writer>, DomainError> {
        let conn = self.lock()?;
        let sql = format!("SELECT {SELECT_COLS} FROM writers WHERE id = ?1");
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![id], Self::row_to_writer)?;
        let writer = rows.next().transpose()?;
        Ok(writer)
    }

    async fn scan(&self, offset: usize, limit: usize) -> Result<Vec<Writer>, DomainError> {
        let (offset, limit) = (sql_int(offset, "Offset")?, sql_int(limit, "Limit")?);
        let conn = self.lock()?;
        let sql = format!("SELECT {SELECT_COLS} FROM writers ORDER BY id ASC LIMIT ?1 OFFSET ?2");
        let mut stmt = conn.prepare(&sql)?;
        let writers = stmt
            .query_map(params![limit, offset], Self::row_to_writer)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(writers)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let conn = self.lock()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM writers", [], |r| r.get(0))?;
        Ok(total as usize)
    }

    async fn knn(&self, query: &KnnQuery) -> Result<Vec<SearchHit>, DomainError> {
        let k = sql_int(query.k, "k")?;
        let conn = self.lock()?;
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(vector_blob::encode(&query.vector))];
        let mut sql = format!(
            "SELECT id, full_name, notable_works, description, {}(embedding, ?1) AS distance
             FROM writers WHERE embedding IS NOT NULL",
            sql_function(query.metric)
        );
        Self::push_filter(&mut sql, &mut param_values, &query.filter);
        sql.push_str(&format!(
            " ORDER BY distance ASC, id ASC LIMIT ?{}",
            param_values.len() + 1
        ));
        param_values.push(Box::new(k));

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let hits = stmt
            .query_map(params_refs.as_slice(), |row| {
                Ok(SearchHit {
                    writer: Self::row_to_summary(row)?,
                    distance: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(hits)
    }

    async fn filter(&self, filter: &WriterFilter) -> Result<Vec<WriterSummary>, DomainError> {
        let limit = filter.limit.map(|l| sql_int(l, "Limit")).transpose()?;
        let conn = self.lock()?;
        let mut sql = String::from(
            "SELECT id, full_name, notable_works, description FROM writers WHERE 1=1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        Self::push_filter(&mut sql, &mut param_values, filter);
        sql.push_str(" ORDER BY id ASC");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit));
        }

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let writers = stmt
            .query_map(params_refs.as_slice(), Self::row_to_summary)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(writers)
    }
}
