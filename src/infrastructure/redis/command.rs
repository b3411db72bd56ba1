//! RediSearch command construction and reply decoding.
//!
//! Values that come from data or users (K, the query vector, filter terms)
//! are always sent through the `PARAMS` block. The query string holds only
//! field names and `$param` references.

use crate::domain::entities::writer::{SearchHit, Writer, WriterSummary};
use crate::domain::error::DomainError;
use crate::domain::ports::vector_store::WriterFilter;
use crate::domain::values::metric::DistanceMetric;
use crate::domain::values::vector_blob;
use redis::Value;
use std::collections::HashMap;

pub const VECTOR_FIELD: &str = "embedding";
pub const DISTANCE_ALIAS: &str = "distance";
const WORKS_PATH: &str = "$.notable_works";
const QUERY_DIALECT: &str = "2";
/// Page size used when a filter has no explicit limit.
pub const DEFAULT_FILTER_LIMIT: usize = 10_000;

/// Ordered argument list for one command. Kept as bytes so the vector blob
/// travels unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandArgs {
    pub name: &'static str,
    pub args: Vec<Vec<u8>>,
}

impl CommandArgs {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            args: Vec::new(),
        }
    }

    fn arg(mut self, a: impl AsRef<[u8]>) -> Self {
        self.args.push(a.as_ref().to_vec());
        self
    }

    pub fn to_cmd(&self) -> redis::Cmd {
        let mut cmd = redis::cmd(self.name);
        for a in &self.args {
            cmd.arg(a.as_slice());
        }
        cmd
    }

    /// Lossy text view of the arguments, for logs and tests.
    pub fn text_args(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect()
    }
}

/// Pre-filter expression and the parameters it references.
fn filter_expression(filter: &WriterFilter) -> (String, Vec<(&'static str, String)>) {
    if filter.is_match_all() {
        return ("*".to_string(), Vec::new());
    }
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(work) = &filter.work {
        clauses.push("@notable_works:{$work}".to_string());
        params.push(("work", work.clone()));
    }
    if let Some(text) = &filter.text {
        clauses.push("@description:$text".to_string());
        params.push(("text", text.clone()));
    }
    (clauses.join(" "), params)
}

fn push_params(mut cmd: CommandArgs, params: &[(&'static str, Vec<u8>)]) -> CommandArgs {
    if params.is_empty() {
        return cmd;
    }
    cmd = cmd.arg("PARAMS").arg((params.len() * 2).to_string());
    for (name, value) in params {
        cmd = cmd.arg(name).arg(value);
    }
    cmd
}

/// `FT.CREATE` for the writers JSON documents.
pub fn create_index(
    index: &str,
    prefix: &str,
    dimension: usize,
    metric: DistanceMetric,
) -> CommandArgs {
    CommandArgs::new("FT.CREATE")
        .arg(index)
        .arg("ON")
        .arg("JSON")
        .arg("PREFIX")
        .arg("1")
        .arg(prefix)
        .arg("SCHEMA")
        .arg("$.id").arg("AS").arg("id").arg("NUMERIC").arg("SORTABLE")
        .arg("$.full_name").arg("AS").arg("full_name").arg("TEXT").arg("SORTABLE")
        .arg("$.description").arg("AS").arg("description").arg("TEXT")
        .arg("$.notable_works[*]").arg("AS").arg("notable_works").arg("TAG")
        .arg("$.embedding").arg("AS").arg(VECTOR_FIELD).arg("VECTOR").arg("FLAT")
        .arg("6")
        .arg("TYPE").arg("FLOAT32")
        .arg("DIM").arg(dimension.to_string())
        .arg("DISTANCE_METRIC").arg(metric.redis_name())
}

/// `(<filter>)=>[KNN $K @embedding $BLOB AS distance]`, sorted by distance.
pub fn knn_search(index: &str, vector: &[f32], k: usize, filter: &WriterFilter) -> CommandArgs {
    let (filter_expr, filter_params) = filter_expression(filter);
    let query = format!("({filter_expr})=>[KNN $K @{VECTOR_FIELD} $BLOB AS {DISTANCE_ALIAS}]");

    let cmd = CommandArgs::new("FT.SEARCH")
        .arg(index)
        .arg(query)
        .arg("RETURN")
        .arg("5")
        .arg(DISTANCE_ALIAS)
        .arg("id")
        .arg("full_name")
        .arg("description")
        .arg(WORKS_PATH)
        .arg("SORTBY")
        .arg(DISTANCE_ALIAS)
        .arg("ASC")
        .arg("LIMIT")
        .arg("0")
        .arg(k.to_string());

    let mut params: Vec<(&'static str, Vec<u8>)> = vec![
        ("K", k.to_string().into_bytes()),
        ("BLOB", vector_blob::encode(vector)),
    ];
    params.extend(filter_params.into_iter().map(|(n, v)| (n, v.into_bytes())));
    push_params(cmd, &params).arg("DIALECT").arg(QUERY_DIALECT)
}

/// Full documents matching `filter`, ordered by id.
pub fn document_search(
    index: &str,
    filter: &WriterFilter,
    offset: usize,
    limit: usize,
) -> CommandArgs {
    let (filter_expr, filter_params) = filter_expression(filter);
    let cmd = CommandArgs::new("FT.SEARCH")
        .arg(index)
        .arg(filter_expr)
        .arg("SORTBY")
        .arg("id")
        .arg("ASC")
        .arg("LIMIT")
        .arg(offset.to_string())
        .arg(limit.to_string())
        .arg("RETURN")
        .arg("1")
        .arg("$");
    let params: Vec<(&'static str, Vec<u8>)> = filter_params
        .into_iter()
        .map(|(n, v)| (n, v.into_bytes()))
        .collect();
    push_params(cmd, &params).arg("DIALECT").arg(QUERY_DIALECT)
}

/// Number of indexed documents, via an empty result page.
pub fn count_search(index: &str) -> CommandArgs {
    CommandArgs::new("FT.SEARCH")
        .arg(index)
        .arg("*")
        .arg("LIMIT")
        .arg("0")
        .arg("0")
        .arg("DIALECT")
        .arg(QUERY_DIALECT)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchDoc {
    pub key: String,
    pub fields: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchReply {
    pub total: i64,
    pub docs: Vec<SearchDoc>,
}

fn value_to_string(v: &Value) -> Result<String, DomainError> {
    match v {
        Value::BulkString(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(s) => Ok(s.clone()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Double(f) => Ok(f.to_string()),
        Value::Okay => Ok("OK".to_string()),
        other => Err(DomainError::Parse(format!(
            "Unexpected value in search reply: {other:?}"
        ))),
    }
}

/// Decode the RESP2 `FT.SEARCH` reply: `[total, key, [field, value, ...], ...]`.
pub fn parse_search_reply(reply: &Value) -> Result<SearchReply, DomainError> {
    let Value::Array(items) = reply else {
        return Err(DomainError::Parse(format!(
            "FT.SEARCH reply is not an array: {reply:?}"
        )));
    };
    let mut iter = items.iter();
    let total = match iter.next() {
        Some(Value::Int(n)) => *n,
        other => {
            return Err(DomainError::Parse(format!(
                "FT.SEARCH reply has no total: {other:?}"
            )))
        }
    };

    let mut docs = Vec::new();
    while let Some(key) = iter.next() {
        let key = value_to_string(key)?;
        let mut fields = HashMap::new();
        if let Some(Value::Array(pairs)) = iter.next() {
            for pair in pairs.chunks(2) {
                if let [name, value] = pair {
                    fields.insert(value_to_string(name)?, value_to_string(value)?);
                }
            }
        }
        docs.push(SearchDoc { key, fields });
    }
    Ok(SearchReply { total, docs })
}

fn required<'a>(doc: &'a SearchDoc, field: &str) -> Result<&'a str, DomainError> {
    doc.fields
        .get(field)
        .map(String::as_str)
        .ok_or_else(|| DomainError::Parse(format!("Document {} has no '{field}' field", doc.key)))
}

/// Accepts `["a","b"]`, `[["a","b"]]` (dialect 3 wrapping) or a bare string.
fn parse_works(raw: &str) -> Vec<String> {
    if let Ok(works) = serde_json::from_str::<Vec<String>>(raw) {
        return works;
    }
    if let Ok(mut nested) = serde_json::from_str::<Vec<Vec<String>>>(raw) {
        if !nested.is_empty() {
            return nested.swap_remove(0);
        }
    }
    if raw.is_empty() {
        Vec::new()
    } else {
        vec![raw.to_string()]
    }
}

/// Hits from a KNN reply. Redis reports squared distances for L2, so those
/// are converted back to Euclidean distance.
pub fn hits_from_reply(
    reply: &SearchReply,
    metric: DistanceMetric,
) -> Result<Vec<SearchHit>, DomainError> {
    reply
        .docs
        .iter()
        .map(|doc| {
            let raw_distance: f64 = required(doc, DISTANCE_ALIAS)?
                .parse()
                .map_err(|e| DomainError::Parse(format!("Bad distance in {}: {e}", doc.key)))?;
            let distance = match metric {
                DistanceMetric::Cosine => raw_distance,
                DistanceMetric::L2 => raw_distance.max(0.0).sqrt(),
            };
            let id: i64 = required(doc, "id")?
                .parse()
                .map_err(|e| DomainError::Parse(format!("Bad id in {}: {e}", doc.key)))?;
            Ok(SearchHit {
                distance,
                writer: WriterSummary {
                    id,
                    full_name: required(doc, "full_name")?.to_string(),
                    notable_works: doc.fields.get(WORKS_PATH).map(|w| parse_works(w)).unwrap_or_default(),
                    description: required(doc, "description")?.to_string(),
                },
            })
        })
        .collect()
}

/// Writers from a reply whose documents carry the whole JSON body in `$`.
pub fn writers_from_reply(reply: &SearchReply) -> Result<Vec<Writer>, DomainError> {
    reply
        .docs
        .iter()
        .map(|doc| {
            let body = required(doc, "$")?;
            serde_json::from_str(body)
                .map_err(|e| DomainError::Parse(format!("Bad document {}: {e}", doc.key)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    #[test]
    fn test_knn_command_binds_k_and_blob() {
        let cmd = knn_search("demo:writers:idx_vss", &[1.0, 0.5], 3, &WriterFilter::default());
        let args = cmd.text_args();
        assert_eq!(cmd.name, "FT.SEARCH");
        assert_eq!(args[0], "demo:writers:idx_vss");
        assert_eq!(args[1], "(*)=>[KNN $K @embedding $BLOB AS distance]");

        let params_at = args.iter().position(|a| a == "PARAMS").unwrap();
        assert_eq!(args[params_at + 1], "4");
        assert_eq!(args[params_at + 2], "K");
        assert_eq!(args[params_at + 3], "3");
        assert_eq!(args[params_at + 4], "BLOB");
        assert_eq!(cmd.args[params_at + 5], vector_blob::encode(&[1.0, 0.5]));
        assert_eq!(&args[args.len() - 2..], &["DIALECT".to_string(), "2".to_string()]);

        let limit_at = args.iter().position(|a| a == "LIMIT").unwrap();
        assert_eq!(&args[limit_at + 1..limit_at + 3], &["0".to_string(), "3".to_string()]);
    }

    #[test]
    fn test_filter_terms_are_parameters_not_query_text() {
        let filter = WriterFilter {
            work: Some("1984".into()),
            text: Some("political".into()),
            limit: None,
        };
        let args = knn_search("idx", &[0.0], 2, &filter).text_args();
        assert_eq!(
            args[1],
            "(@notable_works:{$work} @description:$text)=>[KNN $K @embedding $BLOB AS distance]"
        );
        assert!(!args[1].contains("1984"));
        let params_at = args.iter().position(|a| a == "PARAMS").unwrap();
        assert_eq!(args[params_at + 1], "8");
        assert!(args.contains(&"1984".to_string()));
        assert!(args.contains(&"political".to_string()));
    }

    #[test]
    fn test_create_index_declares_vector_field() {
        let args = create_index("idx", "demo:writers:", 384, DistanceMetric::Cosine).text_args();
        let joined = args.join(" ");
        assert!(joined.starts_with("idx ON JSON PREFIX 1 demo:writers: SCHEMA"));
        assert!(joined.contains("$.embedding AS embedding VECTOR FLAT 6 TYPE FLOAT32 DIM 384 DISTANCE_METRIC COSINE"));
        assert!(joined.contains("$.id AS id NUMERIC SORTABLE"));
    }

    #[test]
    fn test_document_search_pages_by_id() {
        let args = document_search("idx", &WriterFilter::default(), 4, 2).text_args();
        assert_eq!(
            args,
            vec!["idx", "*", "SORTBY", "id", "ASC", "LIMIT", "4", "2", "RETURN", "1", "$", "DIALECT", "2"]
        );
    }

    #[test]
    fn test_parse_knn_reply() {
        let reply = Value::Array(vec![
            Value::Int(2),
            bulk("demo:writers:2"),
            Value::Array(vec![
                bulk("distance"),
                bulk("0.25"),
                bulk("id"),
                bulk("2"),
                bulk("full_name"),
                bulk("Edgar Allan Poe"),
                bulk("description"),
                bulk("A master of Gothic fiction"),
                bulk("$.notable_works"),
                bulk(r#"["The Raven"]"#),
            ]),
            bulk("demo:writers:5"),
            Value::Array(vec![
                bulk("distance"),
                bulk("0.5"),
                bulk("id"),
                bulk("5"),
                bulk("full_name"),
                bulk("Mary Shelley"),
                bulk("description"),
                bulk("Gothic novel"),
                bulk("$.notable_works"),
                bulk(r#"[["Frankenstein"]]"#),
            ]),
        ]);
        let parsed = parse_search_reply(&reply).unwrap();
        assert_eq!(parsed.total, 2);
        let hits = hits_from_reply(&parsed, DistanceMetric::Cosine).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].writer.id, 2);
        assert_eq!(hits[0].distance, 0.25);
        assert_eq!(hits[0].writer.notable_works, vec!["The Raven"]);
        assert_eq!(hits[1].writer.notable_works, vec!["Frankenstein"]);

        let l2 = hits_from_reply(&parsed, DistanceMetric::L2).unwrap();
        assert_eq!(l2[0].distance, 0.5);
    }

    #[test]
    fn test_parse_document_reply() {
        let body = r#"{"id":1,"full_name":"George Orwell","notable_works":["1984"],"description":"Essayist","embedding":[1.0,0.0],"embedding_marker":null,"updated_at":"2024-01-01T00:00:00Z"}"#;
        let reply = Value::Array(vec![
            Value::Int(1),
            bulk("demo:writers:1"),
            Value::Array(vec![bulk("$"), bulk(body)]),
        ]);
        let writers = writers_from_reply(&parse_search_reply(&reply).unwrap()).unwrap();
        assert_eq!(writers[0].id, 1);
        assert_eq!(writers[0].embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_count_reply_and_malformed_reply() {
        let parsed = parse_search_reply(&Value::Array(vec![Value::Int(8)])).unwrap();
        assert_eq!(parsed.total, 8);
        assert!(parsed.docs.is_empty());
        assert!(parse_search_reply(&Value::Nil).is_err());
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let reply = Value::Array(vec![
            Value::Int(1),
            bulk("demo:writers:1"),
            Value::Array(vec![bulk("distance"), bulk("0.1")]),
        ]);
        let parsed = parse_search_reply(&reply).unwrap();
        assert!(matches!(
            hits_from_reply(&parsed, DistanceMetric::Cosine),
            Err(DomainError::Parse(_))
        ));
    }
}
