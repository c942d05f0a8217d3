use crate::config::Config;
use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Maximum characters of a response body shown in debug logs
const RESPONSE_LOG_MAX_CHARS: usize = 200;

/// Chat Completion request for one translation batch
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    #[serde(default)]
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<Message>,
}

/// A remote service that answers a prompt with text.
///
/// Implementations report every failure as a `ProviderError`; the batch
/// translator decides how to recover.
pub trait TranslationProvider {
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, ProviderError>> + Send;
}

/// OpenAI-compatible chat completion endpoint (OpenAI, Groq, ...).
#[derive(Debug, Clone)]
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionProvider {
    /// Build a provider whose every request is bounded by `timeout`.
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::Transport)?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
        })
    }

    /// Build a provider from the provider section of the configuration.
    pub fn from_config(config: &Config, api_key: &str) -> Result<Self, ProviderError> {
        Self::new(
            &config.api_url,
            api_key,
            &config.model,
            config.max_tokens,
            config.request_timeout,
        )
    }

    fn build_request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: Some(prompt.to_string()),
            }],
            temperature: 0.0,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }
}

impl TranslationProvider for ChatCompletionProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = self.build_request(prompt);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: preview(&body),
            });
        }

        parse_response_body(&body)
    }
}

/// Extract the message content from a chat completion response body.
fn parse_response_body(body: &str) -> Result<String, ProviderError> {
    let body = body.trim();
    if body.is_empty() {
        return Err(ProviderError::EmptyBody);
    }
    debug!("Response preview: {}", preview(body));

    let parsed: ChatResponse = serde_json::from_str(body).map_err(ProviderError::MalformedBody)?;

    if let Some(error) = parsed.error {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(ProviderError::ErrorPayload(message));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(ProviderError::NoContent)
}

/// First `RESPONSE_LOG_MAX_CHARS` characters of a body, marked when truncated.
fn preview(body: &str) -> String {
    let mut chars = body.chars();
    let head: String = chars.by_ref().take(RESPONSE_LOG_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
