//! Google Gemini client for generation (plain and streamed) and embeddings.

use crate::model::{Embedder, LanguageModel};
use crate::{AgentError, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_EMBED_MODEL: &str = "models/embedding-001";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Upper bound the API accepts per `batchEmbedContents` call
const DEFAULT_MAX_BATCH: usize = 100;

const API_KEY_HEADER: &str = "x-goog-api-key";

fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_positive<T: std::str::FromStr + PartialOrd + Default>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .filter(|value| *value > T::default())
        .unwrap_or(default)
}

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// Connection settings for the Generative Language API
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub embed_model: String,
    pub timeout: Duration,
    pub max_batch: usize,
    pub generation: GenerationConfig,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_batch: DEFAULT_MAX_BATCH,
            generation: GenerationConfig::default(),
        }
    }

    /// Read `GOOGLE_API_KEY` and the optional `GEMINI_*` overrides
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or(AgentError::MissingApiKey)?;

        Ok(Self {
            api_key,
            base_url: env_or_default("GEMINI_BASE_URL", DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: env_or_default("GEMINI_MODEL", DEFAULT_MODEL),
            embed_model: env_or_default("GEMINI_EMBED_MODEL", DEFAULT_EMBED_MODEL),
            timeout: Duration::from_secs(env_positive("GEMINI_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)),
            max_batch: env_positive("GEMINI_MAX_BATCH", DEFAULT_MAX_BATCH).min(DEFAULT_MAX_BATCH),
            generation: GenerationConfig::default(),
        })
    }
}

/// `gemini-2.0-flash` and `models/gemini-2.0-flash` name the same resource
fn model_path(name: &str) -> String {
    if name.starts_with("models/") || name.starts_with("tunedModels/") {
        name.to_string()
    } else {
        format!("models/{}", name)
    }
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
    model_path: String,
    embed_model_path: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            model_path: model_path(&config.model),
            embed_model_path: model_path(&config.embed_model),
            config,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    fn endpoint(&self, resource: &str, method: &str) -> String {
        format!("{}/{}:{}", self.config.base_url, resource, method)
    }

    fn generate_request<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            generation_config: &self.config.generation,
        }
    }

    async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Response> {
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(body)
            .send()
            .await?;
        ensure_success(response).await
    }

    #[instrument(skip(self, prompt), fields(model = %self.config.model, prompt_len = prompt.len()))]
    async fn generate_content(&self, prompt: &str) -> Result<String> {
        let url = self.endpoint(&self.model_path, "generateContent");
        let response: GenerateResponse = self
            .post(&url, &self.generate_request(prompt))
            .await?
            .json()
            .await?;

        let text = candidate_text(&response)?;
        debug!("Generated {} chars", text.len());
        Ok(text)
    }

    #[instrument(skip(self, prompt, on_text), fields(model = %self.config.model))]
    async fn stream_content(
        &self,
        prompt: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        let url = format!("{}?alt=sse", self.endpoint(&self.model_path, "streamGenerateContent"));
        let response = self.post(&url, &self.generate_request(prompt)).await?;

        let mut decoder = SseDecoder::default();
        let mut full = String::new();
        let mut events = 0usize;
        let mut stream = Box::pin(response.bytes_stream());

        while let Some(bytes) = stream.next().await {
            for payload in decoder.push(&bytes?) {
                events += 1;
                if let Some(delta) = stream_delta(&payload)? {
                    on_text(&delta);
                    full.push_str(&delta);
                }
            }
        }
        for payload in decoder.finish() {
            events += 1;
            if let Some(delta) = stream_delta(&payload)? {
                on_text(&delta);
                full.push_str(&delta);
            }
        }

        debug!("Streamed {} chars in {} events", full.len(), events);
        if full.is_empty() {
            return Err(AgentError::EmptyResponse);
        }
        Ok(full)
    }

    #[instrument(skip(self, text))]
    async fn embed_one(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        let url = self.endpoint(&self.embed_model_path, "embedContent");
        let request = EmbedRequest {
            model: &self.embed_model_path,
            content: Content {
                role: None,
                parts: vec![Part { text }],
            },
            task_type: task,
        };

        let response: EmbedResponse = self.post(&url, &request).await?.json().await?;
        non_empty_embedding(response.embedding.values)
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String], task: TaskType) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint(&self.embed_model_path, "batchEmbedContents");
        let mut results = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.max_batch) {
            let request = BatchEmbedRequest {
                requests: batch
                    .iter()
                    .map(|text| EmbedRequest {
                        model: &self.embed_model_path,
                        content: Content {
                            role: None,
                            parts: vec![Part {
                                text: text.as_str(),
                            }],
                        },
                        task_type: task,
                    })
                    .collect(),
            };

            let response: BatchEmbedResponse = self.post(&url, &request).await?.json().await?;
            if response.embeddings.len() != batch.len() {
                return Err(AgentError::Processing(format!(
                    "requested {} embeddings, received {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            for embedding in response.embeddings {
                results.push(non_empty_embedding(embedding.values)?);
            }
            debug!("Embedded {}/{} texts", results.len(), texts.len());
        }

        Ok(results)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_content(prompt).await
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        on_text: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String> {
        self.stream_content(prompt, on_text).await
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_one(text, TaskType::RetrievalQuery).await
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_batch(texts, TaskType::RetrievalDocument).await
    }

    fn embedding_model(&self) -> &str {
        &self.embed_model_path
    }
}

/// Turn non-2xx responses into `AgentError::Api` with the API's own message
async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(AgentError::Api {
        status: status.as_u16(),
        message: api_error_message(&body),
    })
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|parsed| parsed.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// Concatenated text of the first candidate
fn candidate_text(response: &GenerateResponse) -> Result<String> {
    let Some(candidate) = response.candidates.first() else {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.clone())
        {
            return Err(AgentError::Blocked(reason));
        }
        return Err(AgentError::EmptyResponse);
    };

    let text: String = candidate
        .content
        .as_ref()
        .map(|content| content.parts.iter().filter_map(|p| p.text.as_deref()).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    Ok(text)
}

/// Text carried by one streamed event, if any
fn stream_delta(payload: &str) -> Result<Option<String>> {
    let response: GenerateResponse = serde_json::from_str(payload)?;
    match candidate_text(&response) {
        Ok(text) => Ok(Some(text)),
        Err(AgentError::EmptyResponse) => Ok(None),
        Err(e) => Err(e),
    }
}

fn non_empty_embedding(values: Vec<f32>) -> Result<Vec<f32>> {
    if values.is_empty() {
        return Err(AgentError::Processing("empty embedding returned".into()));
    }
    Ok(values)
}

/// Incremental decoder for `text/event-stream` bodies
///
/// Buffers bytes so multi-byte characters split across network chunks
/// survive, and yields the payload of every complete `data:` line.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = data_payload(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line).into_iter().collect()
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let payload = line.strip_prefix("data:")?.trim_start();
    if payload.is_empty() || payload == "[DONE]" {
        None
    } else {
        Some(payload.to_string())
    }
}

// ==========================================
// REQUEST/RESPONSE TYPES
// ==========================================

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: TaskType,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
