use crate::domain::error::DomainError;
use crate::domain::ports::embedding_port::EmbeddingProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Client for any OpenAI-compatible `/v1/embeddings` endpoint. Point
/// `base_url` at a llama.cpp or Ollama server to run a local GGUF MiniLM.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
}

/// Default for the hosted API; it can shorten its output to `dimensions`.
const HOSTED_MODEL: &str = "text-embedding-3-small";
const HOSTED_BASE_URL: &str = "https://api.openai.com";
/// Default for self-hosted servers, the MiniLM family the 384-wide index is built for.
const SELF_HOSTED_MODEL: &str = "paraphrase-MiniLM-L6-v2";

#[derive(Serialize)]
struct OpenAiRequest {
    input: Vec<String>,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        dimension: usize,
    ) -> Self {
        let default_model = if base_url.is_some() { SELF_HOSTED_MODEL } else { HOSTED_MODEL };
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| default_model.to_string()),
            base_url: base_url
                .unwrap_or_else(|| HOSTED_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            dimension,
        }
    }

    fn request(&self, texts: &[String]) -> OpenAiRequest {
        // Only the text-embedding-3 family accepts a requested width.
        let dimensions = self
            .model
            .starts_with("text-embedding-3")
            .then_some(self.dimension);
        OpenAiRequest {
            input: texts.to_vec(),
            model: self.model.clone(),
            dimensions,
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> DomainError {
    if e.is_timeout() {
        DomainError::Timeout(format!("Embedding API: {e}"))
    } else if e.is_connect() || e.is_request() {
        DomainError::Connection(format!("Embedding API: {e}"))
    } else {
        DomainError::Embedding(format!("Embedding API error: {e}"))
    }
}

/// Restore input order (servers may reorder) and check counts and lengths.
fn collect_embeddings(
    mut data: Vec<OpenAiEmbedding>,
    expected_count: usize,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, DomainError> {
    if data.len() != expected_count {
        return Err(DomainError::Embedding(format!(
            "Expected {expected_count} embeddings, got {}",
            data.len()
        )));
    }
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(DomainError::Embedding(format!(
            "Embedding dimension mismatch: expected {dimension}, got {}",
            bad.len()
        )));
    }
    Ok(vectors)
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAiProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, DomainError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut req = self.client.post(&url).json(&self.request(texts));
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }
        let resp = req.send().await.map_err(map_transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DomainError::Embedding(format!(
                "Embedding API {status}: {body}"
            )));
        }

        let result: OpenAiResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::Parse(format!("Parse error: {e}")))?;
        collect_embeddings(result.data, texts.len(), self.dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_version(&self) -> String {
        format!("openai:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_reordered_by_index() {
        let raw = r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#;
        let resp: OpenAiResponse = serde_json::from_str(raw).unwrap();
        let v = collect_embeddings(resp.data, 2, 2).unwrap();
        assert_eq!(v[0], vec![1.0, 0.0]);
        assert_eq!(v[1], vec![0.0, 1.0]);
    }

    #[test]
    fn test_wrong_dimension_is_rejected() {
        let raw = r#"{"data":[{"embedding":[0.0,1.0,2.0]}]}"#;
        let resp: OpenAiResponse = serde_json::from_str(raw).unwrap();
        assert!(matches!(
            collect_embeddings(resp.data, 1, 2),
            Err(DomainError::Embedding(_))
        ));
    }

    #[test]
    fn test_hosted_default_model_requests_configured_width() {
        let p = OpenAiProvider::new("sk-test".into(), None, None, 384);
        assert_eq!(p.base_url, "https://api.openai.com");
        assert_eq!(p.model_version(), "openai:text-embedding-3-small");
        let body = serde_json::to_value(p.request(&["hi".to_string()])).unwrap();
        assert_eq!(body["dimensions"], 384);
        assert_eq!(body["model"], "text-embedding-3-small");
    }

    #[test]
    fn test_self_hosted_request_has_no_dimensions_field() {
        let p = OpenAiProvider::new(String::new(), None, Some("http://localhost:8080".into()), 384);
        let body = serde_json::to_value(p.request(&["hi".to_string()])).unwrap();
        assert!(body.get("dimensions").is_none());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let p = OpenAiProvider::new(String::new(), None, Some("http://localhost:8080/".into()), 384);
        assert_eq!(p.base_url, "http://localhost:8080");
        assert_eq!(p.model_version(), "openai:paraphrase-MiniLM-L6-v2");
    }
}
