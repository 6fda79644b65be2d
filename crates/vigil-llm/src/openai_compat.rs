//! One adapter for every OpenAI-compatible backend.
//!
//! All configured remote providers (and the keyless local endpoint)
//! accept the OpenAI chat-completions dialect, so a single
//! [`OpenAiCompatProvider`] parameterized by [`ProviderConfig`] covers
//! the whole fleet. API keys are read from the environment on every
//! request, so keys installed through the secrets store take effect
//! without restarting anything.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::provider::Provider;
use crate::types::{ChatMessage, LlmResponse};

/// Configuration for one OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Name the router knows this provider by.
    pub name: String,
    /// Base URL up to (not including) `/chat/completions`.
    pub base_url: String,
    /// Environment variable holding the API key; `None` for keyless
    /// local endpoints.
    pub api_key_env: Option<String>,
    /// Extra headers some backends require.
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn new(name: &str, base_url: &str, api_key_env: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key_env: api_key_env.map(str::to_string),
            headers: HashMap::new(),
            timeout_secs: 120,
        }
    }
}

/// The built-in provider fleet. `ollama_base_url` points at the local
/// keyless endpoint.
pub fn builtin_providers(ollama_base_url: &str) -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("anthropic", "https://api.anthropic.com/v1", Some("ANTHROPIC_API_KEY")),
        ProviderConfig::new("openai", "https://api.openai.com/v1", Some("OPENAI_API_KEY")),
        ProviderConfig::new("mistral", "https://api.mistral.ai/v1", Some("MISTRAL_API_KEY")),
        ProviderConfig::new("grok", "https://api.x.ai/v1", Some("GROK_API_KEY")),
        ProviderConfig::new("ollama", ollama_base_url, None),
    ]
}

/// A provider speaking the OpenAI chat-completions protocol.
pub struct OpenAiCompatProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// The API key as of this moment, re-read from the environment.
    fn current_key(&self) -> Option<String> {
        self.config
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_available(&self) -> bool {
        self.config.api_key_env.is_none() || self.current_key().is_some()
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(env_var) = &self.config.api_key_env {
            let key = self.current_key().ok_or_else(|| {
                ProviderError::NotConfigured(format!("{env_var} is not set"))
            })?;
            request = request.bearer_auth(key);
        }
        for (name, value) in &self.config.headers {
            request = request.header(name, value);
        }

        debug!(provider = %self.config.name, model, "sending completion request");
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5_000);
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::AuthFailed(head(&body)),
                404 => ProviderError::ModelNotFound(model.to_string()),
                429 => ProviderError::RateLimited { retry_after_ms },
                _ => ProviderError::RequestFailed(format!("HTTP {status}: {}", head(&body))),
            });
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("empty choices".into()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            provider: self.config.name.clone(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage
                .total_tokens
                .max(usage.prompt_tokens + usage.completion_tokens),
            finish_reason: choice.finish_reason,
        })
    }
}

fn head(body: &str) -> String {
    body.chars().take(300).collect()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}
