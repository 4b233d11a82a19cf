//! HTTP surface: `POST /api/generate` plus a health check, with permissive CORS.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument as _;

use crate::generate::{EMPTY_PROMPT_MESSAGE, Generator};
use crate::types::GenerationRequest;
use crate::{RelayError, Result};

static REQUEST_ID_SEQ: AtomicU64 = AtomicU64::new(0);

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

#[derive(Clone)]
pub struct RelayHttpState {
    generator: Arc<Generator>,
    allow_origin: HeaderValue,
}

impl RelayHttpState {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator: Arc::new(generator),
            allow_origin: HeaderValue::from_static("*"),
        }
    }

    pub fn with_allow_origin(mut self, origin: &str) -> Result<Self> {
        self.allow_origin = HeaderValue::from_str(origin.trim()).map_err(|err| {
            RelayError::Configuration(format!("invalid allowed origin {origin:?}: {err}"))
        })?;
        Ok(self)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: RelayHttpState) -> Router {
    Router::new()
        .route("/api/generate", generate_route())
        .route("/api/generate.php", generate_route())
        .route("/health", get(health))
        .fallback(handle_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

fn generate_route() -> MethodRouter<RelayHttpState> {
    post(handle_generate).fallback(handle_method_not_allowed)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn handle_generate(
    State(state): State<RelayHttpState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request_id = headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(generate_request_id);
    let span = tracing::info_span!("http_generate", request_id = %request_id);

    let mut response = async {
        let request = match decode_request(&body) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "rejecting undecodable request body");
                return error_response(StatusCode::BAD_REQUEST, EMPTY_PROMPT_MESSAGE);
            }
        };

        let result = state.generator.generate(&request).await;
        let status = StatusCode::from_u16(result.http_status()).unwrap_or(StatusCode::BAD_GATEWAY);
        (status, Json(result)).into_response()
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

fn decode_request(body: &[u8]) -> Result<GenerationRequest> {
    let value: Value = serde_json::from_slice(body)?;
    GenerationRequest::from_json(&value)
}

async fn handle_method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

async fn handle_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "not found")
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.into(),
        }),
    )
        .into_response()
}

/// Answers preflights for every path and stamps CORS headers on every response.
async fn cors(State(state): State<RelayHttpState>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, state.allow_origin.clone());
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

fn generate_request_id() -> String {
    let seq = REQUEST_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or(0);
    format!("relay-{ts_ms}-{seq}")
}
