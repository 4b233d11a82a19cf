//! Outbound clients for the image providers. Each client issues exactly one request per
//! call; ordering and fallback between providers belong to [`crate::generate`].

pub mod starryai;
pub mod unsplash;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::types::GenerationRequest;
use crate::utils::http::CapturedResponse;
use crate::{RelayError, Result};

pub use starryai::StarryAi;
pub use unsplash::Unsplash;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Unsplash,
    StarryAi,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Unsplash, ProviderKind::StarryAi];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unsplash => "unsplash",
            Self::StarryAi => "starryai",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Unsplash => "Unsplash",
            Self::StarryAi => "StarryAI",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "unsplash" => Ok(Self::Unsplash),
            "starryai" | "starry_ai" | "starry-ai" => Ok(Self::StarryAi),
            _ => Err(RelayError::UnknownProvider(name.trim().to_string())),
        }
    }

    pub fn default_api_url(self) -> &'static str {
        match self {
            Self::Unsplash => "https://api.unsplash.com/search/photos",
            Self::StarryAi => "https://api.starryai.com/v1/generation",
        }
    }

    pub fn api_key_env_keys(self) -> &'static [&'static str] {
        match self {
            Self::Unsplash => &["UNSPLASH_ACCESS_KEY"],
            Self::StarryAi => &["STARRYAI_API_KEY"],
        }
    }

    pub fn api_url_env_key(self) -> &'static str {
        match self {
            Self::Unsplash => "UNSPLASH_API_URL",
            Self::StarryAi => "STARRYAI_API_URL",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful provider reply: 2xx status and a body that is at least valid JSON.
#[derive(Clone, Debug, PartialEq)]
pub struct RawProviderBody {
    pub provider: String,
    pub status: reqwest::StatusCode,
    pub body: Value,
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Identifier used for normalization and reported as `source`.
    fn name(&self) -> &str;

    fn display_name(&self) -> &str {
        self.name()
    }

    fn has_credential(&self) -> bool;

    async fn call(&self, request: &GenerationRequest) -> Result<RawProviderBody>;
}

pub fn build_provider(config: &ProviderConfig) -> Result<Arc<dyn ImageProvider>> {
    Ok(match config.kind()? {
        ProviderKind::Unsplash => Arc::new(Unsplash::from_config(config)?),
        ProviderKind::StarryAi => Arc::new(StarryAi::from_config(config)?),
    })
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(RelayError::Http)
}

pub(crate) fn missing_credential(kind: ProviderKind) -> RelayError {
    RelayError::Configuration(format!(
        "{} API key is not configured.",
        kind.display_name()
    ))
}

/// Extra configured parameters that do not collide with the ones the client sets itself.
pub(crate) fn non_reserved_params<'a>(
    provider: ProviderKind,
    extra: &'a BTreeMap<String, String>,
    reserved: &[&str],
) -> impl Iterator<Item = (&'a str, &'a str)> {
    let reserved: Vec<String> = reserved.iter().map(|key| key.to_string()).collect();
    extra.iter().filter_map(move |(name, value)| {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if reserved.iter().any(|key| key == name) {
            tracing::debug!(provider = %provider, param = name, "extra param overlaps a request field; ignoring");
            return None;
        }
        Some((name, value.as_str()))
    })
}

/// Turns a buffered reply into either a JSON body or a transport error carrying
/// the provider's own explanation.
pub(crate) fn into_raw_body(
    kind: ProviderKind,
    captured: CapturedResponse,
) -> Result<RawProviderBody> {
    let provider = kind.as_str();
    let CapturedResponse { status, body } = captured;

    if !status.is_success() {
        let message = crate::normalize::normalize_error(provider, &body, status.as_u16())?;
        return Err(RelayError::Transport {
            provider: provider.to_string(),
            status: Some(status),
            body,
            message,
        });
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(body) => Ok(RawProviderBody {
            provider: provider.to_string(),
            status,
            body,
        }),
        Err(_) => Err(RelayError::Transport {
            provider: provider.to_string(),
            status: Some(status),
            body,
            message: format!("{provider} returned a non-JSON body"),
        }),
    }
}
