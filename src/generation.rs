//! Text generation: the backend capability and the answer engine around it.
//!
//! - [`TextGenerator`] — one method, `generate(prompt)`. Any backend fits.
//! - [`OpenAiGenerator`] — OpenAI-compatible `chat/completions` backend.
//! - [`RetryingGenerator`] — optional decorator with exponential backoff.
//! - [`AnswerEngine`] — bounds every call with a timeout.
//!
//! # Retry Strategy
//!
//! Off by default. When `generation.max_retries > 0`:
//! - network errors, HTTP 429 and 5xx → retry
//! - any other HTTP 4xx or a malformed response → fail immediately
//! - an attempt that exceeds its own timeout → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Each attempt is bounded by `generation.attempt_timeout_secs` (default:
//! the query budget split evenly across attempts) so a stalled first attempt
//! leaves room for the next. The whole sequence, backoff included, still
//! sits inside the [`AnswerEngine`] deadline.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::{Credentials, GenerationConfig};
use crate::error::GenerationError;
use crate::models::Prompt;

/// Upper bound on establishing the backend connection.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// External text-generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<G: TextGenerator + ?Sized> TextGenerator for Arc<G> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

// ============ OpenAI-compatible backend ============

/// Calls an OpenAI-compatible `chat/completions` endpoint with the prompt
/// as a single user message.
pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    connect_timeout_secs: u64,
    credentials: Credentials,
}

impl OpenAiGenerator {
    pub fn new(
        config: &GenerationConfig,
        credentials: Credentials,
    ) -> Result<Self, GenerationError> {
        // No overall request timeout: the answer engine owns the deadline.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(
                config.timeout_secs.min(CONNECT_TIMEOUT_SECS),
            ))
            .build()
            .map_err(|e| GenerationError::Request(error_chain(&e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            connect_timeout_secs: config.timeout_secs.min(CONNECT_TIMEOUT_SECS),
            credentials,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        let mut body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(self.credentials.api_key())
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| request_error(&e, self.connect_timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(error_chain(&e)))?;
        parse_completion(&json)
    }
}

/// Only the connect phase carries a reqwest timeout, so a reqwest timeout
/// means the backend could not be reached in time.
fn request_error(err: &reqwest::Error, connect_timeout_secs: u64) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout(connect_timeout_secs)
    } else {
        GenerationError::Request(error_chain(err))
    }
}

/// Renders an error and all of its sources as `outer: inner: root`.
fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        // hyper and reqwest often repeat the inner message in the outer one
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}

/// Extracts the first choice's text from a chat or legacy completion response.
fn parse_completion(json: &Value) -> Result<String, GenerationError> {
    let choice = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| GenerationError::InvalidResponse("missing choices array".to_string()))?;

    choice
        .pointer("/message/content")
        .or_else(|| choice.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.trim().to_string())
        .ok_or_else(|| GenerationError::InvalidResponse("choice has no text".to_string()))
}

// ============ Retry decorator ============

/// Retries transient failures of the wrapped generator.
pub struct RetryingGenerator<G> {
    inner: G,
    max_retries: u32,
    base_delay: Duration,
    attempt_timeout: Option<Duration>,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, max_retries: u32) -> Self {
        Self {
            inner,
            max_retries,
            base_delay: Duration::from_secs(1),
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let mut attempt = 0;
        loop {
            let result = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, self.inner.generate(prompt))
                    .await
                    .unwrap_or_else(|_| Err(GenerationError::Timeout(limit.as_secs()))),
                None => self.inner.generate(prompt).await,
            };
            let retryable = |e: &GenerationError| {
                e.is_transient() || matches!(e, GenerationError::Timeout(_))
            };
            match result {
                Ok(text) => return Ok(text),
                Err(e) if retryable(&e) && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.base_delay * (1 << (attempt - 1).min(5));
                    tracing::warn!(attempt, ?delay, error = %e, "generation failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============ Answer engine ============

/// Sends a rendered prompt to the backend and bounds the call in time.
pub struct AnswerEngine {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl AnswerEngine {
    pub fn new(generator: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Builds the configured backend: OpenAI-compatible, wrapped in the retry
    /// decorator when `max_retries > 0`.
    pub fn from_config(
        config: &GenerationConfig,
        credentials: Credentials,
    ) -> Result<Self, GenerationError> {
        let backend = OpenAiGenerator::new(config, credentials)?;
        let generator: Arc<dyn TextGenerator> = if config.max_retries > 0 {
            Arc::new(
                RetryingGenerator::new(backend, config.max_retries)
                    .with_attempt_timeout(Duration::from_secs(config.attempt_timeout_secs())),
            )
        } else {
            Arc::new(backend)
        };
        Ok(Self::new(generator, Duration::from_secs(config.timeout_secs)))
    }

    /// One backend call per query. Expiry of the timeout is reported as
    /// [`GenerationError::Timeout`].
    pub async fn answer(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        match tokio::time::timeout(self.timeout, self.generator.generate(prompt.as_str())).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.timeout.as_secs())),
        }
    }
}
