use crate::core::config::Config;
use crate::core::error::ServiceError;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Text completion over some LLM backend: prompt in, trimmed text out.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

pub fn create_llm(config: &Config) -> Result<Arc<dyn LlmClient>> {
    let system = config.llm.system_prompt.clone();
    let backend: Box<dyn LlmClient> = match config.llm.provider.as_str() {
        "gemini" => {
            let cfg = config.llm.gemini.as_ref().context("Gemini config missing")?;
            if cfg.api_key.trim().is_empty() {
                return Err(anyhow!("Gemini api_key missing (set llm.gemini.api_key or GOOGLE_API_KEY)"));
            }
            Box::new(GeminiClient::new(&cfg.api_key, &cfg.model, system))
        }
        "ollama" => {
            let cfg = config.llm.ollama.as_ref().context("Ollama config missing")?;
            Box::new(OllamaClient::new(&cfg.base_url, &cfg.model, system))
        }
        "openai" => {
            let cfg = config.llm.openai.as_ref().context("OpenAI config missing")?;
            if cfg.api_key.trim().is_empty() {
                return Err(anyhow!("OpenAI api_key missing (set llm.openai.api_key or OPENAI_API_KEY)"));
            }
            Box::new(OpenAIClient::new(&cfg.api_key, &cfg.model, cfg.base_url.as_deref(), system))
        }
        _ => return Err(anyhow!("Unknown LLM provider: {}", config.llm.provider)),
    };
    info!("Initialized LLM client for provider: {}", config.llm.provider);

    if config.llm.retry_count == 0 {
        return Ok(Arc::from(backend));
    }
    Ok(Arc::new(RetryingLlm::new(
        backend,
        config.llm.retry_count,
        Duration::from_secs(config.llm.retry_delay_seconds),
    )))
}

fn non_empty(backend: &'static str, text: &str) -> Result<String, ServiceError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ServiceError::EmptyResponse {
            backend,
            reason: "blank text".to_string(),
        });
    }
    Ok(text.to_string())
}

/// Joins `path` onto a base URL that may or may not end in a slash.
fn endpoint(base_url: &str, path: &str) -> Result<Url, ServiceError> {
    let base = format!("{}/", base_url.trim_end_matches('/'));
    Ok(Url::parse(&base)?.join(path)?)
}

async fn error_for_status(
    backend: &'static str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await?;
    Err(ServiceError::Api {
        backend,
        status: status.as_u16(),
        body,
    })
}

// --- Retry ---

/// Retries retryable failures of the wrapped client with a fixed delay plus
/// a little jitter.
#[derive(Debug)]
pub struct RetryingLlm {
    inner: Box<dyn LlmClient>,
    retry_count: usize,
    delay: Duration,
}

impl RetryingLlm {
    pub fn new(inner: Box<dyn LlmClient>, retry_count: usize, delay: Duration) -> Self {
        Self {
            inner,
            retry_count,
            delay,
        }
    }
}

#[async_trait]
impl LlmClient for RetryingLlm {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.retry_count => {
                    attempt += 1;
                    warn!("LLM call failed (retry {}/{}): {}", attempt, self.retry_count, e);
                    let jitter = Duration::from_millis(rand::rng().random_range(0..=250));
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay + jitter).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// --- Gemini ---

pub(crate) const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug)]
pub struct GeminiClient {
    api_key: String,
    model: String,
    system: Option<String>,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, system: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            system,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct GeminiRequest {
    pub(crate) contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<GeminiSystemInstruction>,
}

#[derive(Serialize)]
pub(crate) struct GeminiContent {
    pub(crate) role: String,
    pub(crate) parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
pub(crate) struct GeminiSystemInstruction {
    pub(crate) parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum GeminiPart {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData {
        inline_data: GeminiInlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GeminiInlineData {
    pub(crate) mime_type: String,
    pub(crate) data: String, // base64-encoded
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

/// Sends one `generateContent` request and returns the first candidate's text.
pub(crate) async fn gemini_generate(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    request: &GeminiRequest,
) -> Result<String, ServiceError> {
    let url = endpoint(GEMINI_BASE_URL, &format!("models/{}:generateContent", model))?;
    debug!("Gemini request to model {}", model);

    let resp = client
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(request)
        .send()
        .await?;
    let resp = error_for_status("Gemini", resp).await?;

    let response_text = resp.text().await?;
    extract_gemini_text(&response_text)
}

fn extract_gemini_text(response_text: &str) -> Result<String, ServiceError> {
    let result: GeminiResponse =
        serde_json::from_str(response_text).map_err(|_| ServiceError::Decode {
            backend: "Gemini",
            body: response_text.to_string(),
        })?;

    if let Some(err) = result.error {
        return Err(ServiceError::Backend {
            backend: "Gemini",
            message: err.message,
        });
    }

    let first = result
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .ok_or_else(|| ServiceError::EmptyResponse {
            backend: "Gemini",
            reason: "no candidates".to_string(),
        })?;

    let text: String = first
        .content
        .as_ref()
        .map(|content| content.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
        return Err(ServiceError::EmptyResponse {
            backend: "Gemini",
            reason: format!("finish reason {}", reason),
        });
    }
    non_empty("Gemini", &text)
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::Text {
                    text: prompt.to_string(),
                }],
            }],
            system_instruction: self.system.as_ref().map(|s| GeminiSystemInstruction {
                parts: vec![GeminiPart::Text { text: s.clone() }],
            }),
        };

        gemini_generate(&self.client, &self.api_key, &self.model, &request_body).await
    }
}

// --- Ollama ---

#[derive(Debug)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    system: Option<String>,
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, system: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            system,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn chat_messages(system: Option<&str>, prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: system.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessageResponse,
}

#[derive(Deserialize)]
struct OllamaMessageResponse {
    content: String,
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let url = endpoint(&self.base_url, "api/chat")?;

        let request_body = OllamaRequest {
            model: self.model.clone(),
            messages: chat_messages(self.system.as_deref(), prompt),
            stream: false,
        };

        let resp = self.client.post(url).json(&request_body).send().await?;
        let resp = error_for_status("Ollama", resp).await?;

        let body = resp.text().await?;
        let result: OllamaResponse =
            serde_json::from_str(&body).map_err(|_| ServiceError::Decode {
                backend: "Ollama",
                body: body.clone(),
            })?;
        non_empty("Ollama", &result.message.content)
    }
}

// --- OpenAI ---

#[derive(Debug)]
pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    system: Option<String>,
    client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>, system: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            system,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessageResponse,
}

#[derive(Deserialize)]
struct OpenAIMessageResponse {
    content: Option<String>,
}

fn extract_openai_text(body: &str) -> Result<String, ServiceError> {
    let result: OpenAIResponse = serde_json::from_str(body).map_err(|_| ServiceError::Decode {
        backend: "OpenAI",
        body: body.to_string(),
    })?;
    let content = result
        .choices
        .first()
        .and_then(|choice| choice.message.content.as_deref())
        .ok_or_else(|| ServiceError::EmptyResponse {
            backend: "OpenAI",
            reason: "missing choices or content".to_string(),
        })?;
    non_empty("OpenAI", content)
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let url = endpoint(&self.base_url, "chat/completions")?;

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: chat_messages(self.system.as_deref(), prompt),
        };

        let resp = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;
        let resp = error_for_status("OpenAI", resp).await?;

        let body = resp.text().await?;
        extract_openai_text(&body)
    }
}
