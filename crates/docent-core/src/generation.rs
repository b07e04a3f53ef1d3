//! Generation providers and the fallback chain that makes answering total.
//!
//! A [`FallbackChain`] holds an ordered list of [`GenerationProvider`]s and
//! always ends with the built-in [`MockProvider`]:
//!
//! ```text
//! Pending(p0) ──ok──▶ Success(answer, p0)
//!     │ err / skipped
//!     ▼
//! Pending(p1) ──ok──▶ Success(answer, p1)
//!     │ err / skipped
//!     ▼
//!    ...
//!     ▼
//! Mock ─────────────▶ Success(MOCK_ANSWER, "mock")
//! ```
//!
//! Providers that report themselves unconfigured (e.g. a missing API key)
//! are skipped without an attempt. Every provider error is logged and
//! absorbed; [`FallbackChain::generate`] cannot fail.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::ProviderOutcome;

pub const MOCK_PROVIDER_ID: &str = "mock";
pub const MOCK_ANSWER: &str = "MOCK ANSWER (pipeline OK, no real LLM configured).";
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(20);

/// Failure of a single provider attempt. Never escapes the chain.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    NotConfigured(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Prompt → answer capability.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Identifier reported as the outcome's `provider` (e.g. `"gemini"`).
    fn id(&self) -> &str;

    /// Whether credentials and endpoints are present. Unconfigured providers
    /// are skipped without counting as a failed attempt.
    fn is_configured(&self) -> bool {
        true
    }

    /// Produce an answer within `timeout`.
    async fn generate(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError>;
}

/// Deterministic terminal responder. Needs no network and cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockProvider;

impl MockProvider {
    pub fn answer(&self, _prompt: &str) -> String {
        MOCK_ANSWER.to_string()
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn id(&self) -> &str {
        MOCK_PROVIDER_ID
    }

    async fn generate(&self, prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        Ok(self.answer(prompt))
    }
}

/// What happened to one provider during a [`FallbackChain`] run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptStatus {
    Skipped,
    Failed { cause: String },
    Succeeded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attempt {
    pub provider: String,
    #[serde(flatten)]
    pub status: AttemptStatus,
}

/// Ordered provider list with a guaranteed terminal mock.
pub struct FallbackChain {
    providers: Vec<Box<dyn GenerationProvider>>,
    terminal: MockProvider,
    timeout: Duration,
}

impl FallbackChain {
    /// Build a chain that tries `providers` in order, each with `timeout`,
    /// then falls through to the mock. A `"mock"` entry in `providers` ends
    /// the real list early, since nothing after it could be reached.
    pub fn new(providers: Vec<Box<dyn GenerationProvider>>, timeout: Duration) -> Self {
        let providers = providers
            .into_iter()
            .take_while(|p| p.id() != MOCK_PROVIDER_ID)
            .collect();
        Self {
            providers,
            terminal: MockProvider,
            timeout,
        }
    }

    /// A chain holding only the mock.
    pub fn mock_only() -> Self {
        Self::new(Vec::new(), DEFAULT_PROVIDER_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Provider identifiers in attempt order, ending with `"mock"`.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers
            .iter()
            .map(|p| p.id())
            .chain(std::iter::once(MOCK_PROVIDER_ID))
            .collect()
    }

    /// Answer `prompt` with the first provider that succeeds.
    pub async fn generate(&self, prompt: &str) -> ProviderOutcome {
        self.generate_with_attempts(prompt).await.0
    }

    /// Like [`generate`](Self::generate), also returning the per-provider
    /// attempt log in order.
    pub async fn generate_with_attempts(&self, prompt: &str) -> (ProviderOutcome, Vec<Attempt>) {
        let mut attempts = Vec::with_capacity(self.providers.len() + 1);

        for provider in &self.providers {
            let id = provider.id().to_string();
            if !provider.is_configured() {
                debug!(provider = %id, "provider not configured, skipping");
                attempts.push(Attempt {
                    provider: id,
                    status: AttemptStatus::Skipped,
                });
                continue;
            }

            match provider.generate(prompt, self.timeout).await {
                Ok(answer) => {
                    info!(provider = %id, "generation succeeded");
                    attempts.push(Attempt {
                        provider: id.clone(),
                        status: AttemptStatus::Succeeded,
                    });
                    return (outcome(answer, id), attempts);
                }
                Err(e) => {
                    warn!(provider = %id, error = %e, "generation failed, falling back");
                    attempts.push(Attempt {
                        provider: id,
                        status: AttemptStatus::Failed {
                            cause: e.to_string(),
                        },
                    });
                }
            }
        }

        info!(provider = MOCK_PROVIDER_ID, "all providers exhausted, using mock answer");
        attempts.push(Attempt {
            provider: MOCK_PROVIDER_ID.to_string(),
            status: AttemptStatus::Succeeded,
        });
        (
            outcome(self.terminal.answer(prompt), MOCK_PROVIDER_ID.to_string()),
            attempts,
        )
    }
}

fn outcome(answer: String, provider: String) -> ProviderOutcome {
    ProviderOutcome {
        answer,
        provider,
        timestamp: Utc::now(),
    }
}
