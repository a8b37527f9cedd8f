use std::env;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use super::types::{ApiErrorBody, ChatCompletionRequest, ChatCompletionResponse, ChatMessage};
use crate::cache::{CacheConfig, CacheStats, ResponseCache, cache_key};

const API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 3000;
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    #[error("OPENAI_API_KEY not set. Create one at https://platform.openai.com/api-keys")]
    ApiKeyNotSet,

    #[error("OpenAI rejected the API key: {0}")]
    Unauthorized(String),

    #[error("OpenAI rate limit exceeded. Please retry later.")]
    RateLimited,

    #[error("OpenAI quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("OpenAI API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("OpenAI returned an empty completion (finish reason: {0})")]
    EmptyCompletion(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Abstraction over a chat-completion LLM.
/// Implemented by `OpenAiClient` for production; mock implementations used in tests.
pub trait CompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OpenAiError>;
}

#[derive(Clone)]
struct ApiKey(String);

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
    backoff_ms: u64,
    answers: ResponseCache<String>,
}

impl OpenAiClient {
    pub fn from_env(http: Client, cache: CacheConfig) -> Result<Self, OpenAiError> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| OpenAiError::ApiKeyNotSet)?;
        if api_key.trim().is_empty() {
            return Err(OpenAiError::ApiKeyNotSet);
        }
        let model = env::var("OPENAI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        info!(model = %model, "OpenAI client configured");
        Ok(Self {
            http,
            api_key: ApiKey(api_key.trim().to_string()),
            model,
            base_url: API_BASE.to_string(),
            backoff_ms: INITIAL_BACKOFF_MS,
            answers: ResponseCache::new(cache),
        })
    }

    #[cfg(test)]
    pub(crate) fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            api_key: ApiKey("test-key".to_string()),
            model: DEFAULT_MODEL.to_string(),
            base_url: base_url.to_string(),
            backoff_ms: 1,
            answers: ResponseCache::new(CacheConfig::default()),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.answers.stats()
    }

    pub fn clear_cache(&self) {
        self.answers.clear();
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String, OpenAiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug_assert!(
            url.starts_with("https://") || cfg!(test),
            "API key must only be sent over HTTPS"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key.0)
            .header("User-Agent", crate::USER_AGENT)
            .json(&request)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let classified = classify_api_error(status, &text);
            warn!(error = %classified, "OpenAI API error");
            return Err(classified);
        }

        let body: ChatCompletionResponse = response.json().await?;
        if let Some(err) = body.error {
            let message = err.message.unwrap_or_else(|| "Unknown error".to_string());
            warn!(message = %message, "OpenAI API error in 200 response");
            return Err(OpenAiError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let choice = body.choices.into_iter().next();
        let finish_reason = choice
            .as_ref()
            .and_then(|c| c.finish_reason.clone())
            .unwrap_or_else(|| "none".to_string());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|text| !text.trim().is_empty());

        match content {
            Some(text) => {
                debug!(model = %self.model, finish_reason = %finish_reason, "completion received");
                Ok(text)
            }
            None => Err(OpenAiError::EmptyCompletion(finish_reason)),
        }
    }

    async fn chat_with_retry(&self, system: &str, user: &str) -> Result<String, OpenAiError> {
        let mut last_err = None;
        for attempt in 0..MAX_RETRIES {
            match self.chat(system, user).await {
                Ok(text) => return Ok(text),
                Err(e) if is_retriable(&e) => {
                    last_err = Some(e);
                    if attempt + 1 < MAX_RETRIES {
                        let delay_ms = jittered_backoff(self.backoff_ms, attempt);
                        debug!(
                            attempt = attempt + 1,
                            delay_ms, "retrying after transient error"
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or(OpenAiError::RateLimited))
    }
}

impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, OpenAiError> {
        let key = cache_key(
            "chat",
            &[
                ("model", self.model.clone()),
                ("system", system.to_string()),
                ("user", user.to_string()),
            ],
        );
        self.answers
            .get_or_try_fetch(key, self.chat_with_retry(system, user))
            .await
    }
}

fn is_retriable(e: &OpenAiError) -> bool {
    match e {
        OpenAiError::RateLimited => true,
        OpenAiError::Api { code, .. } => (500..=599).contains(code),
        OpenAiError::Network(e) => e.is_timeout() || e.is_connect(),
        _ => false,
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2).
fn jittered_backoff(initial_ms: u64, attempt: u32) -> u64 {
    let base = initial_ms * 2u64.pow(attempt);
    let half = base / 2;
    half + fastrand::u64(..half.max(1))
}

fn classify_api_error(status: StatusCode, body: &str) -> OpenAiError {
    let parsed = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
    let message = parsed
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            format!("HTTP {status}: {snippet}")
        });
    let quota = parsed.as_ref().is_some_and(|e| {
        e.code.as_deref() == Some("insufficient_quota")
            || e.kind.as_deref() == Some("insufficient_quota")
    });

    match status.as_u16() {
        401 => OpenAiError::Unauthorized(message),
        429 if quota => OpenAiError::QuotaExhausted(message),
        429 => OpenAiError::RateLimited,
        code => OpenAiError::Api { code, message },
    }
}
