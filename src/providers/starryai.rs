//! StarryAI text-to-image generation (`POST /v1/generation`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{ImageProvider, ProviderKind, RawProviderBody};
use crate::config::ProviderConfig;
use crate::types::GenerationRequest;
use crate::utils::http::send_captured;
use crate::Result;

const KIND: ProviderKind = ProviderKind::StarryAi;
const RESERVED_FIELDS: &[&str] = &["prompt", "height", "width", "numberOfImages", "style"];
const IMAGE_WIDTH: u32 = 768;
const IMAGE_HEIGHT: u32 = 512;

pub const DEFAULT_STYLE: &str = "photographic";

pub fn map_style(style: &str) -> &'static str {
    match style {
        "photo" => "photographic",
        "digital-art" => "digital-art",
        "anime" => "anime",
        "oil-painting" => "oil-painting",
        "black-and-white" => "black-and-white",
        "minimal" => "minimalist",
        "vibrant" => "vibrant",
        _ => DEFAULT_STYLE,
    }
}

#[derive(Clone)]
pub struct StarryAi {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    extra_params: BTreeMap<String, String>,
}

impl StarryAi {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http: super::build_http_client(config.timeout)?,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            extra_params: config.extra_params.clone(),
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn request_body(&self, request: &GenerationRequest) -> Map<String, Value> {
        let mut body = Map::<String, Value>::new();
        body.insert("prompt".to_string(), Value::String(request.prompt().to_string()));
        body.insert("height".to_string(), Value::from(IMAGE_HEIGHT));
        body.insert("width".to_string(), Value::from(IMAGE_WIDTH));
        body.insert("numberOfImages".to_string(), Value::from(request.count()));
        body.insert(
            "style".to_string(),
            Value::String(map_style(request.style()).to_string()),
        );
        for (name, value) in super::non_reserved_params(KIND, &self.extra_params, RESERVED_FIELDS) {
            body.insert(name.to_string(), Value::String(value.to_string()));
        }
        body
    }
}

#[async_trait]
impl ImageProvider for StarryAi {
    fn name(&self) -> &str {
        KIND.as_str()
    }

    fn display_name(&self) -> &str {
        KIND.display_name()
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    async fn call(&self, request: &GenerationRequest) -> Result<RawProviderBody> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| super::missing_credential(KIND))?;

        let body = self.request_body(request);
        tracing::debug!(provider = %KIND, url = %self.api_url, count = request.count(), "requesting generation");

        let req = self.http.post(&self.api_url).bearer_auth(api_key).json(&body);
        let captured = send_captured(KIND.as_str(), req).await?;
        super::into_raw_body(KIND, captured)
    }
}
