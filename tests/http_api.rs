mod common;

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;

use common::{config_in, BagOfWords};
use docent::server::router;
use docent::service::RagService;
use docent_core::embedding::EmbeddingProvider;
use docent_core::generation::{FallbackChain, MOCK_PROVIDER_ID};

async fn spawn_api(tmp: &TempDir) -> SocketAddr {
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(BagOfWords::new());
    let service =
        RagService::with_components(config_in(tmp.path()), embedder, FallbackChain::mock_only())
            .unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(Arc::new(service))).await.unwrap();
    });
    addr
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://{}{}", addr, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_version_and_size() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_api(&tmp).await;
    let body: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["chunks"], 0);
}

#[tokio::test]
async fn ingest_search_and_ask_round_trip() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_api(&tmp).await;
    let doc = tmp.path().join("lighthouse.txt");
    std::fs::write(&doc, "The lighthouse keeper trims the lamp wick every evening.").unwrap();

    let (status, body) = post(addr, "/ingest", json!({ "path": doc })).await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "indexed");
    assert_eq!(body["chunks"], 1);
    assert!(body["path"].as_str().unwrap().ends_with("_lighthouse.txt"));

    let (status, body) = post(addr, "/search", json!({ "query": "lamp wick", "k": 3 })).await;
    assert_eq!(status, 200);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["source"], "lighthouse.txt");

    let (status, body) = post(addr, "/ask", json!({ "query": "who trims the lamp?" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["provider"], MOCK_PROVIDER_ID);
    assert_eq!(body["query"], "who trims the lamp?");
    assert_eq!(body["retrieved"][0]["source"], "lighthouse.txt");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn unsupported_file_maps_to_400() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_api(&tmp).await;
    let doc = tmp.path().join("table.xlsx");
    std::fs::write(&doc, "x").unwrap();

    let (status, body) = post(addr, "/ingest", json!({ "path": doc })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "unsupported_format");
}

#[tokio::test]
async fn unreadable_file_maps_to_422() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_api(&tmp).await;
    let doc = tmp.path().join("broken.pdf");
    std::fs::write(&doc, "not a pdf").unwrap();

    let (status, body) = post(addr, "/ingest", json!({ "path": doc })).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["code"], "ingestion_failed");
}

#[tokio::test]
async fn blank_and_malformed_requests_are_bad_requests() {
    let tmp = TempDir::new().unwrap();
    let addr = spawn_api(&tmp).await;

    let (status, body) = post(addr, "/ask", json!({})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = post(addr, "/search", json!({ "query": "  " })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = post(addr, "/search", json!({ "k": 3 })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");
}
