// src/generation/mod.rs

//! AI question generation: prompt, retries with model fallback, schema
//! negotiation, validation and the in-memory payload cache.

pub mod backend;
pub mod cache;
pub mod error;
pub mod prompt;
pub mod retry;
pub mod validate;

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::{Config, QUESTION_CACHE_TTL_SECS},
    models::question::QuestionPayload,
};
use backend::{BackendRequest, GeminiClient, GenerativeBackend};
use cache::PayloadCache;
use error::{FailureKind, GenerationError};
use retry::{CallOutcome, ModelRole, RetryPolicy, RetryState};

pub use error::Violation;

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationRequest {
    /// Skip the fresh-cache short circuit. Quota fallback still applies.
    pub force_refresh: bool,
}

/// Waits out backoff delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub primary_model: String,
    pub fallback_model: String,
    pub cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl GeneratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            cache_ttl: Duration::from_secs(QUESTION_CACHE_TTL_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

/// Serves skill-check payloads, from cache when possible.
pub struct QuestionGenerator {
    /// `Err` when the backend cannot be built (e.g. missing API key); every
    /// request then fails with that error.
    backend: Result<Arc<dyn GenerativeBackend>, GenerationError>,
    settings: GeneratorSettings,
    cache: PayloadCache,
    sleeper: Arc<dyn Sleeper>,
    response_schema: Value,
}

impl QuestionGenerator {
    pub fn new(backend: Arc<dyn GenerativeBackend>, settings: GeneratorSettings) -> Self {
        Self::with_backend(Ok(backend), settings)
    }

    /// Builds the Gemini-backed generator described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let backend = match &config.gemini_api_key {
            Some(key) => GeminiClient::new(key.clone(), &config.gemini_base_url)
                .map(|client| Arc::new(client) as Arc<dyn GenerativeBackend>),
            None => Err(GenerationError::Configuration(
                "GEMINI_API_KEY environment variable is required".to_string(),
            )),
        };

        if let Err(e) = &backend {
            tracing::warn!("Question generation is unavailable: {}", e);
        }

        Self::with_backend(backend, GeneratorSettings::from_config(config))
    }

    fn with_backend(
        backend: Result<Arc<dyn GenerativeBackend>, GenerationError>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            backend,
            cache: PayloadCache::new(settings.cache_ttl),
            settings,
            sleeper: Arc::new(TokioSleeper),
            response_schema: prompt::response_schema(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cache(&self) -> &PayloadCache {
        &self.cache
    }

    /// Returns a validated payload.
    ///
    /// Order: fresh cache, then the backend; on quota failure any cached
    /// payload (even stale) is served instead of the error.
    pub async fn request_questions(
        &self,
        request: GenerationRequest,
    ) -> Result<QuestionPayload, GenerationError> {
        if !request.force_refresh {
            if let Some(payload) = self.cache.fresh().await {
                tracing::debug!("Serving cached questions");
                return Ok(payload);
            }
        }

        match self.generate().await {
            Ok(payload) => {
                self.cache.store(payload.clone()).await;
                Ok(payload)
            }
            Err(e) if e.is_quota() => match self.cache.any().await {
                Some(payload) => {
                    tracing::warn!("Quota exceeded, serving last cached questions: {}", e);
                    Ok(payload)
                }
                None => {
                    tracing::error!("Quota exceeded and nothing cached: {}", e);
                    Err(e)
                }
            },
            Err(GenerationError::Validation(violations)) => {
                tracing::error!("Schema validation failed with {} violation(s):", violations.len());
                for violation in &violations {
                    tracing::error!("  {}", violation);
                }
                Err(GenerationError::Validation(violations))
            }
            Err(e) => {
                tracing::error!("Error generating skill-check questions: {}", e);
                Err(e)
            }
        }
    }

    async fn generate(&self) -> Result<QuestionPayload, GenerationError> {
        let backend = self.backend.as_ref().map_err(|e| e.clone())?;
        let prompt = prompt::build_prompt(&prompt::session_id());
        let text = self.complete_with_retries(backend.as_ref(), &prompt).await?;
        validate::parse_payload(&text)
    }

    /// Drives `RetryPolicy` until a call succeeds or attempts run out.
    async fn complete_with_retries(
        &self,
        backend: &dyn GenerativeBackend,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let policy = &self.settings.retry;
        let mut state = policy.start();
        let mut last_error: Option<GenerationError> = None;

        loop {
            state = match state {
                RetryState::Attempting { attempt, model } => {
                    match self.call_model(backend, model, prompt).await {
                        Ok(text) => return Ok(text),
                        Err(e) => {
                            let outcome = match e {
                                GenerationError::Overloaded(_) => CallOutcome::Overloaded,
                                _ => CallOutcome::Failed,
                            };
                            tracing::warn!(attempt, ?model, "Gemini call failed: {}", e);
                            last_error = Some(e);
                            policy.after_call(state, outcome)
                        }
                    }
                }
                RetryState::Backoff { attempt } => {
                    let delay = policy.backoff_delay(attempt) + policy.jitter();
                    tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Backend overloaded, backing off");
                    self.sleeper.sleep(delay).await;
                    policy.after_backoff(state)
                }
                RetryState::Success | RetryState::Exhausted => break,
            };
        }

        Err(last_error.unwrap_or_else(|| {
            GenerationError::Backend("Unknown error occurred during question generation".to_string())
        }))
    }

    /// One logical call: with the response schema first, and again without it
    /// if the backend finds the schema too complex.
    async fn call_model(
        &self,
        backend: &dyn GenerativeBackend,
        role: ModelRole,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let model = match role {
            ModelRole::Primary => self.settings.primary_model.as_str(),
            ModelRole::Fallback => self.settings.fallback_model.as_str(),
        };

        let constrained = BackendRequest {
            model,
            prompt,
            response_schema: Some(&self.response_schema),
        };

        match backend.generate(constrained).await {
            Ok(text) => Ok(text),
            Err(failure) if failure.kind() == FailureKind::SchemaRejected => {
                tracing::info!(model, "Response schema rejected, retrying without it");
                let unconstrained = BackendRequest {
                    response_schema: None,
                    ..constrained
                };
                backend
                    .generate(unconstrained)
                    .await
                    .map_err(GenerationError::from)
            }
            Err(failure) => Err(failure.into()),
        }
    }
}
