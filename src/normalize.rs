//! Maps provider payloads onto the common [`Image`] shape.
//!
//! Payloads are first parsed into a per-provider [`RawProviderResponse`]. Fields the mapping
//! relies on are then checked one by one so a malformed reply names exactly what is missing
//! instead of collapsing into an empty result.

use serde::Deserialize;
use serde_json::Value;

use crate::providers::ProviderKind;
use crate::types::{Credit, Image};
use crate::{RelayError, Result};

const UNSPLASH_REFERRAL: [(&str, &str); 2] =
    [("utm_source", "ai_image_generator"), ("utm_medium", "referral")];
const STARRYAI_CREDIT_NAME: &str = "StarryAI";
const STARRYAI_CREDIT_LINK: &str = "https://www.starryai.com";
const MAX_ERROR_MESSAGE_CHARS: usize = 300;
const UNSPLASH_FALLBACK_ERROR: &str = "API request failed";
const STARRYAI_FALLBACK_ERROR: &str = "StarryAI API request failed";

#[derive(Debug, Default, Deserialize)]
pub struct UnsplashPhoto {
    #[serde(default)]
    urls: Option<UnsplashUrls>,
    #[serde(default)]
    user: Option<UnsplashUser>,
}

#[derive(Debug, Default, Deserialize)]
struct UnsplashUrls {
    #[serde(default)]
    regular: Option<String>,
    #[serde(default)]
    full: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UnsplashUser {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    links: Option<UnsplashUserLinks>,
}

#[derive(Debug, Default, Deserialize)]
struct UnsplashUserLinks {
    #[serde(default)]
    html: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StarryAiGeneration {
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug)]
pub enum RawProviderResponse {
    Unsplash { results: Vec<UnsplashPhoto> },
    StarryAi { generations: Vec<StarryAiGeneration> },
}

impl RawProviderResponse {
    pub fn parse(provider: &str, body: &Value) -> Result<Self> {
        Self::parse_first(provider, body, usize::MAX)
    }

    /// Like [`Self::parse`], but entries past `limit` are never looked at.
    pub fn parse_first(provider: &str, body: &Value, limit: usize) -> Result<Self> {
        match ProviderKind::from_name(provider)? {
            ProviderKind::Unsplash => Ok(Self::Unsplash {
                results: parse_items(provider, body, "results", limit)?,
            }),
            ProviderKind::StarryAi => Ok(Self::StarryAi {
                generations: parse_items(provider, body, "generations", limit)?,
            }),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Unsplash { .. } => ProviderKind::Unsplash,
            Self::StarryAi { .. } => ProviderKind::StarryAi,
        }
    }

    /// Maps at most `limit` entries. Fewer entries are returned as given.
    pub fn into_images(self, limit: usize) -> Result<Vec<Image>> {
        let provider = self.kind().as_str();
        match self {
            Self::Unsplash { results } => results
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(idx, photo)| unsplash_image(provider, idx, photo))
                .collect(),
            Self::StarryAi { generations } => generations
                .into_iter()
                .take(limit)
                .enumerate()
                .map(|(idx, generation)| starryai_image(provider, idx, generation))
                .collect(),
        }
    }
}

pub fn normalize_success(provider: &str, body: &Value, limit: usize) -> Result<Vec<Image>> {
    RawProviderResponse::parse_first(provider, body, limit)?.into_images(limit)
}

/// Extracts the provider's own explanation from an error body.
pub fn normalize_error(provider: &str, body: &str, status: u16) -> Result<String> {
    let kind = ProviderKind::from_name(provider)?;
    let parsed = serde_json::from_str::<Value>(body).ok();

    let message = match kind {
        ProviderKind::Unsplash => parsed
            .as_ref()
            .and_then(|value| value.get("errors"))
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|err| !err.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .filter(|joined| !joined.is_empty()),
        ProviderKind::StarryAi => parsed
            .as_ref()
            .and_then(|value| value.get("message"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string),
    };
    let message = message.unwrap_or_else(|| {
        tracing::debug!(provider, status, "error body carried no provider message");
        match kind {
            ProviderKind::Unsplash => UNSPLASH_FALLBACK_ERROR.to_string(),
            ProviderKind::StarryAi => STARRYAI_FALLBACK_ERROR.to_string(),
        }
    });
    Ok(truncate_chars(message, MAX_ERROR_MESSAGE_CHARS))
}

fn parse_items<T>(provider: &str, body: &Value, field: &str, limit: usize) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
{
    let items = body
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| RelayError::normalization(provider, field))?;

    items
        .iter()
        .take(limit)
        .enumerate()
        .map(|(idx, item)| {
            T::deserialize(item)
                .map_err(|_| RelayError::normalization(provider, format!("{field}[{idx}]")))
        })
        .collect()
}

fn unsplash_image(provider: &str, idx: usize, photo: UnsplashPhoto) -> Result<Image> {
    let field = |name: &str| format!("results[{idx}].{name}");
    let urls = photo.urls.unwrap_or_default();
    let user = photo.user.unwrap_or_default();

    let url = absolute_url(provider, urls.regular, field("urls.regular"))?;
    let full_url = absolute_url(provider, urls.full, field("urls.full"))?;
    let name = non_empty(provider, user.name, field("user.name"))?;
    let profile = absolute_url(
        provider,
        user.links.and_then(|links| links.html),
        field("user.links.html"),
    )?;

    let mut link = url::Url::parse(&profile)
        .map_err(|_| RelayError::normalization(provider, field("user.links.html")))?;
    link.query_pairs_mut().extend_pairs(UNSPLASH_REFERRAL);

    Ok(Image {
        url,
        full_url,
        credit: Credit {
            name,
            link: link.to_string(),
        },
    })
}

fn starryai_image(provider: &str, idx: usize, generation: StarryAiGeneration) -> Result<Image> {
    let url = absolute_url(
        provider,
        generation.image_url,
        format!("generations[{idx}].image_url"),
    )?;
    Ok(Image {
        full_url: url.clone(),
        url,
        credit: Credit {
            name: STARRYAI_CREDIT_NAME.to_string(),
            link: STARRYAI_CREDIT_LINK.to_string(),
        },
    })
}

fn non_empty(provider: &str, value: Option<String>, field: String) -> Result<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| RelayError::normalization(provider, field))
}

fn absolute_url(provider: &str, value: Option<String>, field: String) -> Result<String> {
    let value = non_empty(provider, value, field.clone())?;
    match url::Url::parse(&value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(value)
        }
        _ => Err(RelayError::normalization(provider, field)),
    }
}

fn truncate_chars(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
