#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use image_relay::server::{RelayHttpState, router};
use image_relay::{GenerationResponse, Generator, ProviderKind};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use common::{
    ScriptedProvider, ScriptedReply, starryai_generation_body, unsplash_photo, unsplash_search_body,
};

fn app_with(primary: ScriptedReply, fallback: ScriptedReply) -> Router {
    let generator = Generator::new(Arc::new(ScriptedProvider::new(
        ProviderKind::Unsplash,
        primary,
    )))
    .with_fallback(Arc::new(ScriptedProvider::new(
        ProviderKind::StarryAi,
        fallback,
    )));
    router(RelayHttpState::new(generator))
}

fn default_app() -> Router {
    app_with(
        ScriptedReply::Body(unsplash_search_body(vec![
            unsplash_photo("a1", "Ann Lee"),
            unsplash_photo("b2", "Bo Park"),
        ])),
        ScriptedReply::Body(starryai_generation_body(&[])),
    )
}

fn post_json(uri: &str, body: impl Into<String>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.into()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn generate_returns_normalized_images() {
    let app = default_app();
    let payload = json!({ "prompt": "mountain lake", "style": "photo", "count": 2 });

    let response = app
        .oneshot(post_json("/api/generate", payload.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["source"], "unsplash");
    assert!(body.get("error").is_none());
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(
        images[0]["url"],
        "https://images.unsplash.com/photo-a1?w=1080"
    );
    assert_eq!(
        images[0]["full_url"],
        "https://images.unsplash.com/photo-a1?q=85"
    );
    assert_eq!(images[0]["credit"]["name"], "Ann Lee");

    let parsed: GenerationResponse = serde_json::from_value(body).unwrap();
    assert!(parsed.success);
    assert_eq!(parsed.images[1].credit.name, "Bo Park");
}

#[tokio::test]
async fn legacy_php_path_is_served_too() {
    let response = default_app()
        .oneshot(post_json("/api/generate.php", r#"{"prompt":"cats"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["source"], "unsplash");
}

#[tokio::test]
async fn missing_or_blank_prompt_is_bad_request() {
    for payload in [r#"{}"#, r#"{"prompt":"   "}"#, r#"{"prompt":42}"#] {
        let response = default_app()
            .oneshot(post_json("/api/generate", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload}");
        let body = json_body(response).await;
        assert_eq!(body, json!({ "success": false, "error": "Prompt is required" }));
    }
}

#[tokio::test]
async fn undecodable_body_is_bad_request() {
    for payload in ["not json", "", r#"["prompt"]"#] {
        let response = default_app()
            .oneshot(post_json("/api/generate", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{payload:?}");
        assert_eq!(json_body(response).await["success"], false);
    }
}

#[tokio::test]
async fn preflight_gets_empty_ok_with_cors_headers() {
    for uri in ["/api/generate", "/anything/else"] {
        let request = Request::builder()
            .method("OPTIONS")
            .uri(uri)
            .header("origin", "https://app.example")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();
        let response = default_app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers().clone();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(
            headers["access-control-allow-methods"],
            "GET, POST, OPTIONS"
        );
        assert_eq!(
            headers["access-control-allow-headers"],
            "Content-Type, Authorization"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }
}

#[tokio::test]
async fn configured_origin_is_echoed() {
    let generator = Generator::new(Arc::new(ScriptedProvider::new(
        ProviderKind::Unsplash,
        ScriptedReply::Body(unsplash_search_body(vec![unsplash_photo("a1", "Ann")])),
    )));
    let state = RelayHttpState::new(generator)
        .with_allow_origin("https://app.example")
        .unwrap();
    let response = router(state)
        .oneshot(post_json("/api/generate", r#"{"prompt":"cats"}"#))
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "https://app.example"
    );
}

#[tokio::test]
async fn upstream_status_is_mirrored() {
    let app = app_with(
        ScriptedReply::upstream(429, "Rate Limit Exceeded"),
        ScriptedReply::upstream(500, "overloaded"),
    );
    let response = app
        .oneshot(post_json("/api/generate", r#"{"prompt":"cats"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(
        json_body(response).await,
        json!({ "success": false, "error": "Image generation failed: Rate Limit Exceeded" })
    );
}

#[tokio::test]
async fn empty_search_is_a_bad_request() {
    let app = app_with(
        ScriptedReply::Body(unsplash_search_body(vec![])),
        ScriptedReply::Body(starryai_generation_body(&["https://cdn.starryai.example/a.png"])),
    );
    let response = app
        .oneshot(post_json("/api/generate", r#"{"prompt":"zzzqqq"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "No images found for the given prompt. Please try another search term."
    );
}

#[tokio::test]
async fn request_id_is_echoed() {
    let mut request = post_json("/api/generate", r#"{"prompt":"cats"}"#);
    request
        .headers_mut()
        .insert("x-request-id", "req-123".parse().unwrap());
    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));

    let request = Request::builder()
        .uri("/nope")
        .body(Body::empty())
        .unwrap();
    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(json_body(response).await["success"], false);

    let request = Request::builder()
        .method("GET")
        .uri("/api/generate")
        .body(Body::empty())
        .unwrap();
    let response = default_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
