//! Text-generation clients
//!
//! Uses reqwest to call the configured provider. The request/response
//! shaping per provider family lives here and nowhere else; callers only
//! see [`TextGenerator`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::models::{GenerateError, ProviderKind, ProviderSettings};

/// The single seam between this core and any text-generation provider
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, GenerateError>;
}

/// Build the backend matching the configured provider family
pub fn backend_from_settings(settings: ProviderSettings) -> Arc<dyn TextGenerator> {
    match settings.kind {
        ProviderKind::ChatCompletions => Arc::new(ChatCompletionsBackend::new(settings)),
        ProviderKind::Gemini => Arc::new(GeminiBackend::new(settings)),
    }
}

fn build_http_client(timeout_seconds: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .expect("Failed to create HTTP client")
}

fn map_send_error(e: reqwest::Error, timeout_seconds: u64) -> GenerateError {
    if e.is_timeout() {
        GenerateError::Timeout(timeout_seconds)
    } else {
        GenerateError::Api(e.to_string())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GenerateError> {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(GenerateError::RateLimited(retry_after));
    }
    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(GenerateError::Api(format!("API error {}: {}", status, error_text)));
    }
    Ok(response)
}

// ============================================================================
// OpenAI-compatible Chat Completions
// ============================================================================

pub struct ChatCompletionsBackend {
    http_client: Client,
    settings: ProviderSettings,
}

impl ChatCompletionsBackend {
    pub fn new(settings: ProviderSettings) -> Self {
        let http_client = build_http_client(settings.timeout_seconds);
        Self { http_client, settings }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsBackend {
    async fn generate_text(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        let request = ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage { role: "user".to_string(), content: prompt.to_string() }],
            max_tokens: Some(max_output_tokens),
            temperature: Some(temperature),
        };

        let url = format!("{}/chat/completions", self.settings.api_base.trim_end_matches('/'));
        tracing::debug!("calling chat completions API: {} model={}", url, self.settings.model);

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.settings.timeout_seconds))?;

        let response = check_status(response).await?;
        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Parse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerateError::Parse("empty response from backend".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

// ============================================================================
// Gemini generateContent
// ============================================================================

pub struct GeminiBackend {
    http_client: Client,
    settings: ProviderSettings,
}

impl GeminiBackend {
    pub fn new(settings: ProviderSettings) -> Self {
        let http_client = build_http_client(settings.timeout_seconds);
        Self { http_client, settings }
    }
}

#[async_trait]
impl TextGenerator for GeminiBackend {
    async fn generate_text(
        &self,
        prompt: &str,
        temperature: f64,
        max_output_tokens: u32,
    ) -> Result<String, GenerateError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature,
                max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.model
        );
        tracing::debug!("calling generateContent API: model={}", self.settings.model);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.settings.timeout_seconds))?;

        let response = check_status(response).await?;
        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::Parse(e.to_string()))?;

        gemini_response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenerateError::Parse("empty response from backend".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}
