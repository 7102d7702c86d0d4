//! Generation backends.
//!
//! - **[`DisabledGenerator`]** reports every request as unavailable; used
//!   when `[generation].provider = "disabled"` so that retrieval commands
//!   work without an API key.
//! - **[`OpenAiGenerator`]** calls an OpenAI-compatible chat-completions
//!   endpoint (OpenRouter by default).
//!
//! # Retry Strategy
//!
//! - HTTP 429 → retry, reported as [`GenerationError::RateLimited`]
//! - HTTP 5xx and network errors → retry, reported as
//!   [`GenerationError::ServiceUnavailable`]
//! - Other HTTP 4xx → fail immediately with [`GenerationError::Rejected`]
//! - Backoff: 1s, 2s, 4s, ... (capped at 2^5)
//!
//! The whole exchange, retries and backoff included, is bounded by the
//! timeout passed to [`Generator::generate`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

use docchat_core::error::GenerationError;
use docchat_core::generation::Generator;
use docchat_core::models::Role;
use docchat_core::prompt::Prompt;

use crate::config::GenerationConfig;

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &Prompt, _timeout: Duration) -> Result<String, GenerationError> {
        Err(GenerationError::ServiceUnavailable(
            "generation is disabled; set [generation].provider in the config".to_string(),
        ))
    }
}

pub struct OpenAiGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} not set", config.api_key_env))?;
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for openai provider"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.base_url.clone(),
            model,
            api_key,
            max_retries: config.max_retries,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, prompt: &Prompt) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({"role": "system", "content": prompt.system})];
        for turn in &prompt.history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({"role": role, "content": turn.text}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt.user}));

        serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        })
    }

    async fn send_with_retry(&self, body: &serde_json::Value) -> Result<String, GenerationError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .header("X-Title", "docchat")
                .json(body)
                .send()
                .await;

            let err = match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            GenerationError::ServiceUnavailable(format!("invalid response body: {}", e))
                        })?;
                        return parse_completion(&json);
                    }
                    let body_text = response.text().await.unwrap_or_default();
                    classify_status(status, &body_text)
                }
                Err(e) if e.is_timeout() => {
                    GenerationError::ServiceUnavailable(format!("request timed out: {}", e))
                }
                Err(e) => GenerationError::ServiceUnavailable(e.to_string()),
            };

            if !err.is_transient() {
                return Err(err);
            }
            warn!(attempt, error = %err, "generation attempt failed");
            last_err = Some(err);
        }

        Err(last_err.unwrap_or_else(|| {
            GenerationError::ServiceUnavailable("generation failed after retries".to_string())
        }))
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt, timeout: Duration) -> Result<String, GenerationError> {
        let body = self.request_body(prompt);
        debug!(model = %self.model, url = %self.url, "sending completion request");
        match tokio::time::timeout(timeout, self.send_with_retry(&body)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(timeout.as_secs())),
        }
    }
}

/// Map a non-success HTTP status to a generation error.
fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let detail = format!("HTTP {}: {}", status, body.trim());
    if status == StatusCode::TOO_MANY_REQUESTS {
        GenerationError::RateLimited(detail)
    } else if status.is_server_error() {
        GenerationError::ServiceUnavailable(detail)
    } else {
        GenerationError::Rejected(detail)
    }
}

/// Extract `choices[0].message.content` from a chat-completions response.
fn parse_completion(json: &serde_json::Value) -> Result<String, GenerationError> {
    if let Some(message) = json.pointer("/error/message").and_then(|m| m.as_str()) {
        return Err(GenerationError::ServiceUnavailable(message.to_string()));
    }
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            GenerationError::ServiceUnavailable("response contained no completion".to_string())
        })
}

/// Create the backend named by `[generation].provider`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledGenerator`] |
/// | `"openai"` | [`OpenAiGenerator`] |
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai" => Ok(Box::new(OpenAiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
