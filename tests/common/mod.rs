#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image_relay::{GenerationRequest, ImageProvider, ProviderKind, RawProviderBody, RelayError};
use serde_json::{Value, json};

pub fn unsplash_photo(id: &str, author: &str) -> Value {
    json!({
        "id": id,
        "urls": {
            "full": format!("https://images.unsplash.com/photo-{id}?q=85"),
            "regular": format!("https://images.unsplash.com/photo-{id}?w=1080"),
        },
        "user": {
            "name": author,
            "links": { "html": format!("https://unsplash.com/@{}", author.to_lowercase()) },
        },
    })
}

pub fn unsplash_search_body(photos: Vec<Value>) -> Value {
    json!({ "total": photos.len(), "results": photos })
}

pub fn starryai_generation_body(urls: &[&str]) -> Value {
    json!({
        "generations": urls
            .iter()
            .map(|url| json!({ "image_url": url }))
            .collect::<Vec<_>>(),
    })
}

/// What a [`ScriptedProvider`] answers with on every call.
#[derive(Clone, Debug)]
pub enum ScriptedReply {
    /// A 2xx reply; the body still goes through normalization.
    Body(Value),
    Upstream { status: Option<u16>, message: String },
}

impl ScriptedReply {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn unreachable(provider: ProviderKind) -> Self {
        Self::Upstream {
            status: None,
            message: format!("could not reach {provider} (connection failed)"),
        }
    }
}

/// In-memory provider that records what it was asked for.
#[derive(Debug)]
pub struct ScriptedProvider {
    kind: ProviderKind,
    credential: bool,
    reply: ScriptedReply,
    calls: AtomicUsize,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, reply: ScriptedReply) -> Self {
        Self {
            kind,
            credential: true,
            reply,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn without_credential(mut self) -> Self {
        self.credential = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for ScriptedProvider {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn display_name(&self) -> &str {
        self.kind.display_name()
    }

    fn has_credential(&self) -> bool {
        self.credential
    }

    async fn call(&self, request: &GenerationRequest) -> image_relay::Result<RawProviderBody> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        match &self.reply {
            ScriptedReply::Body(body) => Ok(RawProviderBody {
                provider: self.kind.as_str().to_string(),
                status: reqwest::StatusCode::OK,
                body: body.clone(),
            }),
            ScriptedReply::Upstream { status, message } => Err(RelayError::Transport {
                provider: self.kind.as_str().to_string(),
                status: status.and_then(|code| reqwest::StatusCode::from_u16(code).ok()),
                body: String::new(),
                message: message.clone(),
            }),
        }
    }
}
