use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored writer biography with its description embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Writer {
    pub id: i64,
    pub full_name: String,
    pub notable_works: Vec<String>,
    pub description: String,
    /// Empty when the row was loaded without a vector.
    pub embedding: Vec<f32>,
    pub embedding_marker: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Ingestion record as it appears in the dataset file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWriter {
    pub full_name: String,
    #[serde(default)]
    pub notable_works: Vec<String>,
    pub description: String,
}

/// Writer metadata without the embedding, as returned by searches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterSummary {
    pub id: i64,
    pub full_name: String,
    pub notable_works: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub distance: f64,
    #[serde(flatten)]
    pub writer: WriterSummary,
}

impl Writer {
    pub fn new(
        id: i64,
        record: NewWriter,
        embedding: Vec<f32>,
        embedding_marker: Option<String>,
    ) -> Self {
        Self {
            id,
            full_name: record.full_name,
            notable_works: record.notable_works,
            description: record.description,
            embedding,
            embedding_marker,
            updated_at: Utc::now(),
        }
    }

    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty()
    }

    pub fn summary(&self) -> WriterSummary {
        WriterSummary {
            id: self.id,
            full_name: self.full_name.clone(),
            notable_works: self.notable_works.clone(),
            description: self.description.clone(),
        }
    }

    /// Copy of this writer carrying a freshly computed vector and marker.
    pub fn with_embedding(&self, embedding: Vec<f32>, embedding_marker: String) -> Self {
        Self {
            embedding,
            embedding_marker: Some(embedding_marker),
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

impl NewWriter {
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err(format!("Writer '{}' has no description", self.full_name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str) -> NewWriter {
        NewWriter {
            full_name: "George Orwell".into(),
            notable_works: vec!["1984".into(), "Animal Farm".into()],
            description: description.into(),
        }
    }

    #[test]
    fn test_blank_description_is_rejected() {
        assert!(record("   ").validate().is_err());
        assert!(record("English novelist and essayist").validate().is_ok());
    }

    #[test]
    fn test_summary_drops_embedding() {
        let w = Writer::new(7, record("Essayist"), vec![0.1, 0.2], None);
        let s = w.summary();
        assert_eq!(s.id, 7);
        assert_eq!(s.notable_works, vec!["1984", "Animal Farm"]);
    }

    #[test]
    fn test_notable_works_default_to_empty() {
        let r: NewWriter =
            serde_json::from_str(r#"{"full_name":"Anon","description":"Unknown"}"#).unwrap();
        assert!(r.notable_works.is_empty());
    }
}
