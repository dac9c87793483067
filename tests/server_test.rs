mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tower::ServiceExt;

use common::{FakeDelivery, Journal, JournalPacer, MemoryConnector, MemorySource};
use partner_export::app::dispatch_use_case::DispatchUseCase;
use partner_export::app::export_use_case::ExportUseCase;
use partner_export::config::{ExportConfig, StatsConfig};
use partner_export::pipeline::processing::phone::IndiaRule;
use partner_export::server::{create_server, AppState};

fn state(dir: &Path) -> Arc<AppState> {
    let source = MemorySource {
        partners: vec![
            json!({"id": 1, "name": "Acme", "phone": "9876543210", "city": "Patna", "comment": false}),
            json!({"id": 2, "name": "Bolt", "phone": false, "city": "Patna", "comment": false}),
        ],
        orders: vec![json!({"partner_id": [1, "Acme"], "amount_total": 10, "state": "sale"})],
        fail_orders: false,
    };
    let export = ExportConfig {
        output_dir: dir.to_string_lossy().into_owned(),
        ..ExportConfig::default()
    };
    let journal = Arc::new(Journal::default());
    Arc::new(AppState {
        export: ExportUseCase::new(Arc::new(MemoryConnector::new(source)), export, StatsConfig::default()),
        dispatch: DispatchUseCase::new(
            Arc::new(FakeDelivery {
                configured: true,
                reject: Vec::new(),
                journal: journal.clone(),
            }),
            Arc::new(JournalPacer { journal }),
            Arc::new(IndiaRule::default()),
            Duration::ZERO,
        ),
    })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let tmp = tempdir().unwrap();
    let response = create_server(state(tmp.path())).oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");
}

#[tokio::test]
async fn test_generate_then_download() {
    let tmp = tempdir().unwrap();
    let app = create_server(state(tmp.path()));

    let response = app
        .clone()
        .oneshot(post_json("/api/generate-csv", json!({"city": "Patna"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    let url = body["download_url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/download/partner_export_patna_"));

    let response = app.oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .starts_with("attachment;"));
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.starts_with("id,name,street,phone,city"));
    assert!(text.contains("Acme"));
}

#[tokio::test]
async fn test_generate_with_no_matches_is_not_found() {
    let tmp = tempdir().unwrap();
    let response = create_server(state(tmp.path()))
        .oneshot(post_json("/api/generate-csv", json!({"city": "Gaya"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await["error"],
        "No customers found with filters (city: Gaya)."
    );
}

#[tokio::test]
async fn test_download_rejects_unknown_files() {
    let tmp = tempdir().unwrap();
    let response = create_server(state(tmp.path()))
        .oneshot(get("/download/missing.csv"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_send_bulk_uses_export_phones_when_none_given() {
    let tmp = tempdir().unwrap();
    let response = create_server(state(tmp.path()))
        .oneshot(post_json("/api/send-bulk", json!({"message": "Hello", "city": "Patna"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report = body_json(response).await;
    assert_eq!(report["total"], 1);
    assert_eq!(report["sent"], 1);
    assert_eq!(report["results"][0]["message_id"], "wamid.919876543210");
}

#[tokio::test]
async fn test_send_bulk_requires_a_message() {
    let tmp = tempdir().unwrap();
    let response = create_server(state(tmp.path()))
        .oneshot(post_json("/api/send-bulk", json!({"message": "  ", "phones": ["9876543210"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
