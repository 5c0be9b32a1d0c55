//! OpenAI-compatible embedding and structured-generation providers.
//!
//! This module is only available when the `openai` feature is enabled.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::rewrite::StructuredGenerator;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
const PROVIDER: &str = "OpenAI";

struct Credentials {
    api_key: String,
    base_url: String,
}

impl Credentials {
    fn new(api_key: String) -> Option<Self> {
        (!api_key.is_empty()).then(|| Self { api_key, base_url: DEFAULT_BASE_URL.into() })
    }

    /// Reads `OPENAI_API_KEY` and, if set, `OPENAI_BASE_URL`.
    fn from_env() -> Option<Self> {
        let mut credentials = Self::new(std::env::var("OPENAI_API_KEY").ok()?)?;
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            credentials.base_url = base_url.trim_end_matches('/').to_string();
        }
        Some(credentials)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Send a JSON POST and decode the body, or describe the failure.
async fn post_json<Req: Serialize, Resp: DeserializeOwned>(
    client: &reqwest::Client,
    credentials: &Credentials,
    path: &str,
    body: &Req,
) -> std::result::Result<Resp, String> {
    let response = client
        .post(credentials.url(path))
        .bearer_auth(&credentials.api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let detail =
            serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body);
        return Err(format!("API returned {status}: {detail}"));
    }

    response.json().await.map_err(|e| format!("failed to parse response: {e}"))
}

/// An [`EmbeddingProvider`] backed by the `/embeddings` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use backlink_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("guest post pricing").await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    client: reqwest::Client,
    credentials: Credentials,
    model: String,
    dimensions: usize,
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider using `text-embedding-3-small` (1536 dimensions).
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let credentials = Credentials::new(api_key.into())
            .ok_or_else(|| embedding_error("API key must not be empty"))?;
        Ok(Self::with_credentials(credentials))
    }

    /// Create a provider from `OPENAI_API_KEY` (and optional `OPENAI_BASE_URL`).
    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()
            .ok_or_else(|| embedding_error("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::with_credentials(credentials))
    }

    fn with_credentials(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            model: DEFAULT_EMBEDDING_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Request truncated embeddings of `dims` dimensions.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions,
        };
        let mut response: EmbeddingResponse =
            post_json(&self.client, &self.credentials, "embeddings", &request)
                .await
                .map_err(|message| {
                    error!(provider = PROVIDER, error = %message, "embedding request failed");
                    embedding_error(message)
                })?;

        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// A [`StructuredGenerator`] backed by chat completions with a
/// `json_schema` response format.
pub struct OpenAIStructuredGenerator {
    client: reqwest::Client,
    credentials: Credentials,
    model: String,
    temperature: f32,
}

impl OpenAIStructuredGenerator {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let credentials = Credentials::new(api_key.into())
            .ok_or_else(|| generation_error("API key must not be empty"))?;
        Ok(Self::with_credentials(credentials))
    }

    pub fn from_env() -> Result<Self> {
        let credentials = Credentials::from_env()
            .ok_or_else(|| generation_error("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self::with_credentials(credentials))
    }

    fn with_credentials(credentials: Credentials) -> Self {
        Self {
            client: reqwest::Client::new(),
            credentials,
            model: DEFAULT_CHAT_MODEL.into(),
            temperature: 0.2,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    response_format: Value,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[async_trait]
impl StructuredGenerator for OpenAIStructuredGenerator {
    async fn generate_object(&self, prompt: &str, schema: &Value) -> Result<Value> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            "generating object"
        );

        let request = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            response_format: json!({
                "type": "json_schema",
                "json_schema": { "name": "result", "strict": true, "schema": schema }
            }),
        };
        let response: ChatResponse =
            post_json(&self.client, &self.credentials, "chat/completions", &request)
                .await
                .map_err(|message| {
                    error!(provider = PROVIDER, error = %message, "generation request failed");
                    generation_error(message)
                })?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| generation_error("API returned no content"))?;
        serde_json::from_str(&content)
            .map_err(|e| generation_error(format!("response is not JSON: {e}")))
    }
}

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.into(), message: message.into() }
}

fn generation_error(message: impl Into<String>) -> RagError {
    RagError::GenerationError { provider: PROVIDER.into(), message: message.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_api_key() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new(""),
            Err(RagError::EmbeddingError { .. })
        ));
        assert!(matches!(
            OpenAIStructuredGenerator::new(""),
            Err(RagError::GenerationError { .. })
        ));
    }

    #[test]
    fn dimensions_override() {
        let provider = OpenAIEmbeddingProvider::new("sk-test").unwrap();
        assert_eq!(provider.dimensions(), 1536);
        assert_eq!(provider.with_dimensions(256).dimensions(), 256);
    }

    #[test]
    fn builds_endpoint_urls() {
        let credentials = Credentials::new("sk-test".into()).unwrap();
        assert_eq!(credentials.url("embeddings"), "https://api.openai.com/v1/embeddings");
    }
}
