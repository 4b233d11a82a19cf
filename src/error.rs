use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{provider} transport error: {message}")]
    Transport {
        provider: String,
        status: Option<reqwest::StatusCode>,
        body: String,
        message: String,
    },
    #[error("{provider} response is missing or has an invalid `{field}`")]
    Normalization { provider: String, field: String },
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RelayError {
    pub(crate) fn normalization(provider: &str, field: impl Into<String>) -> Self {
        Self::Normalization {
            provider: provider.to_string(),
            field: field.into(),
        }
    }

    /// Transport and normalization failures may be recovered by asking another provider.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Normalization { .. })
    }

    pub fn upstream_status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
