use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::{RelayError, Result};

pub const DEFAULT_STYLE: &str = "photo";
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 4;

/// A validated-shape request for images. Construction never rejects the prompt;
/// emptiness is decided by the generator so every entry point reports it the same way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    style: String,
    count: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into().trim().to_string(),
            style: DEFAULT_STYLE.to_string(),
            count: MIN_COUNT,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        let style = style.into();
        let style = style.trim();
        self.style = if style.is_empty() {
            DEFAULT_STYLE.to_string()
        } else {
            style.to_string()
        };
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = clamp_count(count);
        self
    }

    /// Decodes the browser payload `{ "prompt", "style"?, "count"? }`.
    ///
    /// `count` is accepted as an integer, a float or a numeric string; anything
    /// else counts as zero and is clamped like every other value.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| RelayError::Validation("request body must be a JSON object".into()))?;

        let prompt = obj.get("prompt").and_then(Value::as_str).unwrap_or_default();
        let mut request = Self::new(prompt);
        if let Some(style) = obj.get("style").and_then(Value::as_str) {
            request = request.with_style(style);
        }
        match obj.get("count") {
            None | Some(Value::Null) => {}
            Some(count) => request = request.with_count(coerce_count(count)),
        }
        Ok(request)
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn style(&self) -> &str {
        &self.style
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn has_prompt(&self) -> bool {
        !self.prompt.is_empty()
    }
}

pub fn clamp_count(count: i64) -> u32 {
    count.clamp(i64::from(MIN_COUNT), i64::from(MAX_COUNT)) as u32
}

fn coerce_count(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
                .unwrap_or(0)
        }
        Value::Bool(true) => 1,
        _ => 0,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    pub name: String,
    pub link: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub full_url: String,
    pub credit: Credit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Configuration,
    NoResults,
    Upstream { status: Option<u16> },
    Internal,
}

impl FailureKind {
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation | Self::NoResults => 400,
            Self::Configuration | Self::Internal => 500,
            Self::Upstream { status } => status
                .filter(|status| (400..=599).contains(status))
                .unwrap_or(502),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationResult {
    Success { images: Vec<Image>, source: String },
    Failed(GenerationFailure),
}

impl GenerationResult {
    pub(crate) fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed(GenerationFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn images(&self) -> &[Image] {
        match self {
            Self::Success { images, .. } => images,
            Self::Failed(_) => &[],
        }
    }

    pub fn source(&self) -> Option<&str> {
        match self {
            Self::Success { source, .. } => Some(source),
            Self::Failed(_) => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed(failure) => Some(&failure.message),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::Success { .. } => 200,
            Self::Failed(failure) => failure.kind.http_status(),
        }
    }
}

#[derive(Serialize)]
struct WireResult<'a> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [Image]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for GenerationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let wire = match self {
            Self::Success { images, source } => WireResult {
                success: true,
                images: Some(images),
                source: Some(source),
                error: None,
            },
            Self::Failed(failure) => WireResult {
                success: false,
                images: None,
                source: None,
                error: Some(&failure.message),
            },
        };
        wire.serialize(serializer)
    }
}

/// Owned form of the wire body, for callers of the HTTP API.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
