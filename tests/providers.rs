//! Generation providers against in-process fake upstreams.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use docent::config::GenerationConfig;
use docent::providers::{build_chain, GeminiProvider, OllamaGenerator};
use docent_core::generation::{
    AttemptStatus, FallbackChain, GenerationProvider, ProviderError, MOCK_PROVIDER_ID,
};

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn fake_gemini() -> SocketAddr {
    spawn(Router::new().route(
        "/generate",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                return (StatusCode::FORBIDDEN, Json(json!({"error": "bad key"})));
            }
            let prompt = body["contents"][0]["parts"][0]["text"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            (
                StatusCode::OK,
                Json(json!({
                    "candidates": [{"content": {"parts": [{"text": format!("gemini saw: {}", prompt)}]}}]
                })),
            )
        }),
    ))
    .await
}

async fn fake_ollama(status: StatusCode, delay: Duration) -> SocketAddr {
    spawn(Router::new().route(
        "/api/generate",
        post(move |Json(body): Json<Value>| async move {
            tokio::time::sleep(delay).await;
            assert_eq!(body["stream"], false);
            (
                status,
                Json(json!({"model": body["model"], "response": "ollama answer", "done": true})),
            )
        }),
    ))
    .await
}

#[tokio::test]
async fn gemini_sends_key_and_reads_first_candidate() {
    let addr = fake_gemini().await;
    let provider = GeminiProvider::new(
        "gemini-2.5-flash",
        Some(&format!("http://{}/generate", addr)),
        Some("test-key".to_string()),
    );
    let answer = provider
        .generate("hello", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(answer, "gemini saw: hello");
}

#[tokio::test]
async fn gemini_http_error_is_status() {
    let addr = fake_gemini().await;
    let provider = GeminiProvider::new(
        "gemini-2.5-flash",
        Some(&format!("http://{}/generate", addr)),
        Some("wrong".to_string()),
    );
    let err = provider
        .generate("hello", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Status { code: 403, .. }));
}

#[tokio::test]
async fn ollama_reads_response_field() {
    let addr = fake_ollama(StatusCode::OK, Duration::ZERO).await;
    let provider = OllamaGenerator::new(&format!("http://{}", addr), "phi3:mini");
    let answer = provider.generate("hi", Duration::from_secs(5)).await.unwrap();
    assert_eq!(answer, "ollama answer");
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let addr = fake_ollama(StatusCode::OK, Duration::from_secs(3)).await;
    let provider = OllamaGenerator::new(&format!("http://{}", addr), "phi3:mini");
    let err = provider
        .generate("hi", Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Timeout(_) | ProviderError::Transport(_)
    ));
}

#[tokio::test]
async fn unreachable_upstream_is_transport_error() {
    // Bind then drop to obtain a port nothing listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let provider = OllamaGenerator::new(&format!("http://{}", addr), "phi3:mini");
    let err = provider
        .generate("hi", Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Transport(_)));
}

#[tokio::test]
async fn chain_falls_from_failing_gemini_to_ollama() {
    let gemini = fake_gemini().await;
    let ollama = fake_ollama(StatusCode::OK, Duration::ZERO).await;
    let chain = FallbackChain::new(
        vec![
            Box::new(GeminiProvider::new(
                "m",
                Some(&format!("http://{}/generate", gemini)),
                Some("wrong".to_string()),
            )) as Box<dyn GenerationProvider>,
            Box::new(OllamaGenerator::new(&format!("http://{}", ollama), "phi3:mini")),
        ],
        Duration::from_secs(5),
    );

    let (outcome, attempts) = chain.generate_with_attempts("q").await;
    assert_eq!(outcome.provider, "ollama");
    assert_eq!(outcome.answer, "ollama answer");
    assert!(matches!(attempts[0].status, AttemptStatus::Failed { .. }));
}

#[tokio::test]
async fn chain_without_key_or_server_answers_with_mock() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let chain = FallbackChain::new(
        vec![
            Box::new(GeminiProvider::new("m", None, None)) as Box<dyn GenerationProvider>,
            Box::new(OllamaGenerator::new(&format!("http://{}", dead), "phi3:mini")),
        ],
        Duration::from_secs(2),
    );
    let (outcome, attempts) = chain.generate_with_attempts("q").await;
    assert_eq!(outcome.provider, MOCK_PROVIDER_ID);
    assert_eq!(attempts[0].status, AttemptStatus::Skipped);
    assert!(matches!(attempts[1].status, AttemptStatus::Failed { .. }));
    assert_eq!(attempts[2].status, AttemptStatus::Succeeded);
}

#[test]
fn configured_chain_follows_provider_order() {
    let cfg = GenerationConfig {
        providers: vec!["gemini".to_string(), "ollama".to_string()],
        ..GenerationConfig::default()
    };
    assert_eq!(
        build_chain(&cfg).provider_ids(),
        vec!["gemini", "ollama", MOCK_PROVIDER_ID]
    );
}
