//! HTTP generation providers and chain assembly from configuration.
//!
//! Each provider implements [`GenerationProvider`] from `docent-core`; the
//! [`FallbackChain`] there handles ordering, skipping, and the terminal
//! mock. [`build_chain`] turns `[generation]` config into a chain.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use docent_core::generation::{
    FallbackChain, GenerationProvider, ProviderError, MOCK_PROVIDER_ID,
};

use crate::config::GenerationConfig;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Run `fut` under `timeout`, mapping elapsed time to [`ProviderError::Timeout`].
async fn bounded<F>(timeout: Duration, fut: F) -> Result<String, ProviderError>
where
    F: std::future::Future<Output = Result<String, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::Timeout(timeout)),
    }
}

fn transport(e: reqwest::Error) -> ProviderError {
    ProviderError::Transport(e.to_string())
}

/// POST `body` and return the parsed JSON of a 2xx response.
async fn post_json(
    request: reqwest::RequestBuilder,
    body: &serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
    let response = request.json(body).send().await.map_err(transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            code: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

// ============ Gemini ============

/// Gemini `generateContent` over REST. Unconfigured without an API key.
pub struct GeminiProvider {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(model: &str, endpoint: Option<&str>, api_key: Option<String>) -> Self {
        let endpoint = match endpoint {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => format!("{}/{}:generateContent", GEMINI_BASE_URL, model),
        };
        Self {
            endpoint,
            api_key: api_key.filter(|k| !k.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    /// Reads `GEMINI_API_KEY` from the environment.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(
            &config.gemini_model,
            config.gemini_url.as_deref(),
            std::env::var("GEMINI_API_KEY").ok(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn request(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY not set".to_string()))?;
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}]
        });
        let request = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", api_key)
            .timeout(timeout);
        let json = post_json(request, &body).await?;
        parse_gemini_response(&json)
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn id(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        bounded(timeout, self.request(prompt, timeout)).await
    }
}

/// Answer text at `candidates[0].content.parts[0].text`.
pub fn parse_gemini_response(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.pointer("/candidates/0/content/parts/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ProviderError::MalformedResponse(
                "missing candidates[0].content.parts[0].text".to_string(),
            )
        })
}

// ============ Ollama ============

/// Non-streaming `POST /api/generate` against a local Ollama server.
pub struct OllamaGenerator {
    url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(url: &str, model: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(&config.ollama_url, &config.ollama_model)
    }

    async fn request(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let request = self
            .client
            .post(format!("{}/api/generate", self.url))
            .timeout(timeout);
        let json = post_json(request, &body).await?;
        parse_ollama_response(&json)
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn id(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError> {
        bounded(timeout, self.request(prompt, timeout)).await
    }
}

pub fn parse_ollama_response(json: &serde_json::Value) -> Result<String, ProviderError> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| ProviderError::MalformedResponse("missing response field".to_string()))
}

/// Instantiate the providers named in `config.providers`, in order.
///
/// Names are validated at config load; an unknown name here is skipped.
/// `"mock"` is left to the chain, which appends it unconditionally.
pub fn build_providers(config: &GenerationConfig) -> Vec<Box<dyn GenerationProvider>> {
    let mut providers: Vec<Box<dyn GenerationProvider>> = Vec::new();
    for name in &config.providers {
        match name.as_str() {
            "gemini" => providers.push(Box::new(GeminiProvider::from_config(config))),
            "ollama" => providers.push(Box::new(OllamaGenerator::from_config(config))),
            MOCK_PROVIDER_ID => break,
            other => debug!(provider = other, "ignoring unknown generation provider"),
        }
    }
    providers
}

pub fn build_chain(config: &GenerationConfig) -> FallbackChain {
    FallbackChain::new(build_providers(config), config.timeout())
}
