//! Primary-then-fallback orchestration.
//!
//! A request moves through `Validating -> CallingPrimary -> (done | CallingFallback) -> done`.
//! Providers are always tried in order and never concurrently. When both fail the caller sees
//! the primary provider's error; the fallback error only reaches the logs.

use std::sync::Arc;

use tracing::Instrument as _;

use crate::config::RelayConfig;
use crate::normalize::normalize_success;
use crate::providers::{ImageProvider, build_provider};
use crate::types::{FailureKind, GenerationRequest, GenerationResult, Image};
use crate::{RelayError, Result};

pub const NO_RESULTS_MESSAGE: &str =
    "No images found for the given prompt. Please try another search term.";
pub const EMPTY_PROMPT_MESSAGE: &str = "Prompt is required";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NextStep {
    Succeed,
    NoResults,
    TryFallback,
    Fail,
}

/// Zero images from a reachable primary is reported as-is; only errors that another provider
/// could plausibly avoid lead to the fallback.
pub(crate) fn after_primary(primary: &Result<Vec<Image>>, fallback_available: bool) -> NextStep {
    match primary {
        Ok(images) if !images.is_empty() => NextStep::Succeed,
        Ok(_) => NextStep::NoResults,
        Err(err) if err.is_recoverable() && fallback_available => NextStep::TryFallback,
        Err(_) => NextStep::Fail,
    }
}

#[derive(Clone)]
pub struct Generator {
    primary: Arc<dyn ImageProvider>,
    fallback: Option<Arc<dyn ImageProvider>>,
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("primary", &self.primary.name())
            .field("fallback", &self.fallback.as_ref().map(|p| p.name()))
            .finish()
    }
}

impl Generator {
    pub fn new(primary: Arc<dyn ImageProvider>) -> Self {
        Self {
            primary,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ImageProvider>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let mut generator = Self::new(build_provider(&config.primary)?);
        if let Some(fallback) = config.fallback.as_ref() {
            generator = generator.with_fallback(build_provider(fallback)?);
        }
        Ok(generator)
    }

    pub fn primary(&self) -> &dyn ImageProvider {
        self.primary.as_ref()
    }

    /// The fallback, but only when it can actually be called.
    pub fn usable_fallback(&self) -> Option<&dyn ImageProvider> {
        self.fallback
            .as_deref()
            .filter(|provider| provider.has_credential())
    }

    pub async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let span = tracing::info_span!(
            "generate",
            primary = self.primary.name(),
            style = request.style(),
            count = request.count(),
            source = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );
        let result = self.run(request).instrument(span.clone()).await;
        match &result {
            GenerationResult::Success { source, images } => {
                span.record("source", tracing::field::display(source));
                span.record("outcome", "success");
                tracing::info!(parent: &span, images = images.len(), "generation finished");
            }
            GenerationResult::Failed(failure) => {
                span.record("outcome", tracing::field::debug(failure.kind));
                tracing::info!(parent: &span, error = %failure.message, "generation failed");
            }
        }
        result
    }

    async fn run(&self, request: &GenerationRequest) -> GenerationResult {
        if !request.has_prompt() {
            return GenerationResult::failed(FailureKind::Validation, EMPTY_PROMPT_MESSAGE);
        }
        if !self.primary.has_credential() {
            tracing::error!(provider = self.primary.name(), "primary provider has no api key");
            return GenerationResult::failed(
                FailureKind::Configuration,
                format!("{} API key is not configured.", self.primary.display_name()),
            );
        }

        let primary = attempt(self.primary.as_ref(), request).await;
        let fallback = self.usable_fallback();

        match after_primary(&primary, fallback.is_some()) {
            NextStep::Succeed => GenerationResult::Success {
                images: primary.unwrap_or_default(),
                source: self.primary.name().to_string(),
            },
            NextStep::NoResults => {
                GenerationResult::failed(FailureKind::NoResults, NO_RESULTS_MESSAGE)
            }
            NextStep::Fail => match primary {
                Err(err) => {
                    log_failure("primary", self.primary.name(), &err);
                    failure_for(&err)
                }
                Ok(_) => GenerationResult::failed(FailureKind::Internal, "Image generation failed"),
            },
            NextStep::TryFallback => {
                let Err(primary_err) = primary else {
                    return GenerationResult::failed(
                        FailureKind::Internal,
                        "Image generation failed",
                    );
                };
                log_failure("primary", self.primary.name(), &primary_err);
                let Some(fallback) = fallback else {
                    return failure_for(&primary_err);
                };

                match attempt(fallback, request).await {
                    // Zero images from the fallback still counts as success.
                    Ok(images) => GenerationResult::Success {
                        images,
                        source: fallback.name().to_string(),
                    },
                    Err(fallback_err) => {
                        log_failure("fallback", fallback.name(), &fallback_err);
                        failure_for(&primary_err)
                    }
                }
            }
        }
    }
}

async fn attempt(provider: &dyn ImageProvider, request: &GenerationRequest) -> Result<Vec<Image>> {
    let raw = provider.call(request).await?;
    normalize_success(provider.name(), &raw.body, request.count() as usize)
}

fn failure_for(err: &RelayError) -> GenerationResult {
    match err {
        RelayError::Transport {
            status, message, ..
        } => GenerationResult::failed(
            FailureKind::Upstream {
                status: status.map(|status| status.as_u16()),
            },
            format!("Image generation failed: {message}"),
        ),
        RelayError::Normalization { provider, .. } => GenerationResult::failed(
            FailureKind::Upstream { status: None },
            format!("Image generation failed: {provider} returned an unexpected response"),
        ),
        RelayError::Validation(message) => {
            GenerationResult::failed(FailureKind::Validation, message.clone())
        }
        RelayError::Configuration(message) => {
            GenerationResult::failed(FailureKind::Configuration, message.clone())
        }
        _ => GenerationResult::failed(
            FailureKind::Internal,
            "Image generation failed: internal error",
        ),
    }
}

fn log_failure(stage: &'static str, provider: &str, err: &RelayError) {
    match err {
        RelayError::Transport { status, body, .. } => tracing::warn!(
            stage,
            provider,
            status = status.map(|status| status.as_u16()),
            body = %body,
            error = %err,
            "provider call failed"
        ),
        _ => tracing::warn!(stage, provider, error = %err, "provider call failed"),
    }
}
