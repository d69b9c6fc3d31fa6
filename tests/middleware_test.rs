//! Request pipeline tests against a live server.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::http::header;
use axum::routing::get;
use axum::{BoxError, Extension, Router};
use common::{capture_logs, client, start_server, test_config};
use reqwest::StatusCode;
use service_scaffold::http::{Aborted, RequestId, ServerDependency, X_REQUEST_ID};
use service_scaffold::observability::Severity;

async fn echo_request_id(Extension(id): Extension<RequestId>) -> String {
    id.to_string()
}

async fn explode() -> &'static str {
    panic!("handler exploded");
}

async fn abort() -> Aborted {
    Aborted
}

async fn file() -> &'static str {
    "raw bytes"
}

async fn csv() -> ([(header::HeaderName, &'static str); 1], &'static str) {
    ([(header::CONTENT_TYPE, "text/csv")], "id,name\n1,alice\n")
}

fn routes() -> Router {
    Router::new()
        .route("/echo", get(echo_request_id))
        .route("/panic", get(explode))
        .route("/abort", get(abort))
        .route("/files/report.txt", get(file))
        .route("/export.csv", get(csv))
}

#[tokio::test]
async fn propagates_incoming_request_id() {
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;

    let response = client()
        .get(server.url("/echo"))
        .header(X_REQUEST_ID, "abc-123")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(X_REQUEST_ID).is_none());
    assert_eq!(response.text().await.unwrap(), "abc-123");

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn generates_unique_request_ids() {
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;
    let client = client();

    let requests = (0..20).map(|_| {
        let client = client.clone();
        let url = server.url("/echo");
        async move { client.get(url).send().await.unwrap().text().await.unwrap() }
    });
    let ids: Vec<String> = futures_util::future::join_all(requests).await;

    let unique: HashSet<&String> = ids.iter().collect();
    assert_eq!(unique.len(), ids.len());
    assert!(ids.iter().all(|id| !id.is_empty()));

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn marks_responses_as_json_except_files() {
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;
    let client = client();

    let health = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(health.headers()["content-type"], "application/json");
    assert_eq!(health.text().await.unwrap(), r#"{"status": 1}"#);

    let file = client
        .get(server.url("/files/report.txt"))
        .send()
        .await
        .unwrap();
    assert_ne!(
        file.headers()
            .get("content-type")
            .map(|v| v.to_str().unwrap()),
        Some("application/json")
    );

    let export = client.get(server.url("/export.csv")).send().await.unwrap();
    assert_eq!(export.headers()["content-type"], "text/csv");

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn unknown_routes_and_methods_get_json_errors() {
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;
    let client = client();

    let missing = client.get(server.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(missing.headers()["content-type"], "application/json");
    assert_eq!(
        missing.text().await.unwrap(),
        r#"{"status": 0, "error": "requested url not found"}"#
    );

    let wrong_method = client.post(server.url("/health")).send().await.unwrap();
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        wrong_method.text().await.unwrap(),
        r#"{"status": 0, "error": "request method not allowed"}"#
    );

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn recovers_from_handler_panic() {
    let (_guard, logs) = capture_logs(Severity::Info);
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;
    let client = client();

    let response = client
        .get(server.url("/panic"))
        .header(X_REQUEST_ID, "panic-req")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["content-type"], "application/json");

    let critical = logs.with_severity("CRITICAL");
    assert_eq!(critical.len(), 1);
    let record = &critical[0];
    assert_eq!(record["panic"], "handler exploded");
    assert_eq!(record["request_id"], "panic-req");
    assert!(!record["stack"].as_str().unwrap().is_empty());
    assert!(record["logging.googleapis.com/sourceLocation"].is_object());

    let after = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn abort_closes_connection_silently() {
    let (_guard, logs) = capture_logs(Severity::Trace);
    let server = start_server(test_config(), ServerDependency::default(), routes()).await;
    let client = client();

    let result = client.get(server.url("/abort")).send().await;
    assert!(result.is_err());

    assert!(logs.with_severity("ERROR").is_empty());
    assert!(logs.with_severity("CRITICAL").is_empty());

    let after = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(after.status(), StatusCode::OK);

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn create_user_calls_dependency() {
    let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
    let recorder = Arc::clone(&seen);
    let dependency = ServerDependency::new(move |id: RequestId, username: String| {
        let recorder = Arc::clone(&recorder);
        async move {
            recorder.lock().unwrap().push((id.to_string(), username));
            Ok::<(), BoxError>(())
        }
    });
    let server = start_server(test_config(), dependency, Router::new()).await;

    let response = client()
        .post(server.url("/users"))
        .header(X_REQUEST_ID, "user-req")
        .json(&serde_json::json!({ "username": "alice" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[("user-req".to_string(), "alice".to_string())]
    );

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn create_user_reports_dependency_failure() {
    let dependency = ServerDependency::new(|_, _| async {
        Err::<(), BoxError>("username taken".into())
    });
    let server = start_server(test_config(), dependency, Router::new()).await;

    let response = client()
        .post(server.url("/users"))
        .json(&serde_json::json!({ "username": "bob" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], 0);
    assert_eq!(body["error"], "username taken");

    server.handle.shutdown(std::time::Duration::from_secs(1)).await.unwrap();
}
