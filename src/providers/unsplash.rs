//! Unsplash photo search (`GET /search/photos`).

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::{ImageProvider, ProviderKind, RawProviderBody};
use crate::config::ProviderConfig;
use crate::types::GenerationRequest;
use crate::utils::http::send_captured;
use crate::Result;

const KIND: ProviderKind = ProviderKind::Unsplash;
const RESERVED_PARAMS: &[&str] = &["query", "per_page", "orientation", "color", "content_filter"];

/// Search filters standing in for an aesthetic; search has no notion of "style" itself.
pub fn style_params(style: &str) -> &'static [(&'static str, &'static str)] {
    match style {
        "black-and-white" => &[("color", "black_and_white")],
        "minimal" => &[("content_filter", "high")],
        "vibrant" => &[("color", "vibrant")],
        _ => &[],
    }
}

#[derive(Clone)]
pub struct Unsplash {
    http: reqwest::Client,
    api_url: String,
    access_key: Option<String>,
    extra_params: BTreeMap<String, String>,
}

impl Unsplash {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Ok(Self {
            http: super::build_http_client(config.timeout)?,
            api_url: config.api_url.clone(),
            access_key: config.api_key.clone(),
            extra_params: config.extra_params.clone(),
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn query_params(&self, request: &GenerationRequest) -> Vec<(String, String)> {
        let mut params = vec![
            ("query".to_string(), request.prompt().to_string()),
            ("per_page".to_string(), request.count().to_string()),
            ("orientation".to_string(), "landscape".to_string()),
        ];
        for (name, value) in style_params(request.style()) {
            params.push((name.to_string(), value.to_string()));
        }
        for (name, value) in super::non_reserved_params(KIND, &self.extra_params, RESERVED_PARAMS) {
            params.push((name.to_string(), value.to_string()));
        }
        params
    }
}

#[async_trait]
impl ImageProvider for Unsplash {
    fn name(&self) -> &str {
        KIND.as_str()
    }

    fn display_name(&self) -> &str {
        KIND.display_name()
    }

    fn has_credential(&self) -> bool {
        self.access_key.is_some()
    }

    async fn call(&self, request: &GenerationRequest) -> Result<RawProviderBody> {
        let access_key = self
            .access_key
            .as_deref()
            .ok_or_else(|| super::missing_credential(KIND))?;

        let params = self.query_params(request);
        tracing::debug!(provider = %KIND, url = %self.api_url, count = request.count(), "searching photos");

        let req = self
            .http
            .get(&self.api_url)
            .query(&params)
            .header("authorization", format!("Client-ID {access_key}"))
            .header("accept-version", "v1");
        let captured = send_captured(KIND.as_str(), req).await?;
        super::into_raw_body(KIND, captured)
    }
}
