use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, Router};
use cbci_chat_gateway::api::EMPTY_MESSAGE_ERROR;
use cbci_chat_gateway::backend::{Backend, BackendError};
use cbci_chat_gateway::{build_app, AppState};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Answers every question with a canned result and remembers what it was asked.
struct FakeBackend {
    reply: Option<Value>,
    asked: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn answering(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn ask(&self, question: &str) -> Result<Value, BackendError> {
        self.asked.lock().unwrap().push(question.to_string());
        self.reply.clone().ok_or(BackendError::Closed)
    }

    fn mode(&self) -> &'static str {
        "fake"
    }
}

fn build_test_app(backend: Arc<FakeBackend>) -> Router {
    build_app(AppState::new(backend))
}

fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn e2e_chat_success_path_returns_answer() {
    let backend = FakeBackend::answering(json!({"status": "success", "answer": "12345명"}));
    let app = build_test_app(backend.clone());

    let response = app
        .oneshot(chat_request(json!({"message": "서울 2023년 학생수"}).to_string()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        r#"{"success":true,"message":"12345명","user_message":"서울 2023년 학생수"}"#
    );
    assert_eq!(backend.asked(), ["서울 2023년 학생수"]);
}

#[tokio::test]
async fn e2e_chat_trims_message_before_asking() {
    let backend = FakeBackend::answering(json!({"status": "success", "answer": "42개교"}));
    let app = build_test_app(backend.clone());

    let request = chat_request(json!({"message": "  부산 고등학교 수 \n"}).to_string());
    let (status, body) = send(app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["user_message"], "부산 고등학교 수");
    assert_eq!(backend.asked(), ["부산 고등학교 수"]);
}

#[tokio::test]
async fn e2e_blank_messages_are_rejected() {
    let backend = FakeBackend::answering(json!("unused"));

    for payload in [
        json!({"message": ""}),
        json!({"message": "   "}),
        json!({"message": "\t\n"}),
        json!({"message": null}),
        json!({}),
    ] {
        let app = build_test_app(backend.clone());
        let (status, body) = send(app, chat_request(payload.to_string())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {payload}");
        assert_eq!(body, json!({"success": false, "error": EMPTY_MESSAGE_ERROR}));
    }

    assert!(backend.asked().is_empty());
}

#[tokio::test]
async fn e2e_unstructured_replies_are_stringified() {
    let cases = [
        (json!("질문을 이해하지 못했습니다"), "질문을 이해하지 못했습니다"),
        (json!(12345), "12345"),
        (Value::Null, "null"),
        (
            json!({"status": "error", "message": "no data"}),
            r#"{"message":"no data","status":"error"}"#,
        ),
        (json!({"status": "success"}), r#"{"status":"success"}"#),
        (json!(["success", "12345명"]), r#"["success","12345명"]"#),
    ];

    for (reply, expected) in cases {
        let app = build_test_app(FakeBackend::answering(reply));
        let (status, body) = send(app, chat_request(r#"{"message":"q"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], expected);
        assert_eq!(body["user_message"], "q");
    }
}

#[tokio::test]
async fn e2e_backend_failure_returns_bad_gateway() {
    let app = build_test_app(FakeBackend::failing());

    let (status, body) = send(app, chat_request(r#"{"message":"서울 2023년 학생수"}"#)).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "backend closed the connection");
    assert_eq!(body["user_message"], "서울 2023년 학생수");
    assert!(body.get("message").is_none());
}

#[tokio::test]
async fn e2e_malformed_body_returns_envelope() {
    let backend = FakeBackend::answering(json!("unused"));

    for raw in [r#"{"message":"#, r#"{"message":42}"#, "not json"] {
        let (status, body) = send(build_test_app(backend.clone()), chat_request(raw)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "body {raw}");
        assert_eq!(body["success"], false);
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    let missing_content_type = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .body(Body::from(r#"{"message":"q"}"#))
        .unwrap();
    let (status, body) = send(build_test_app(backend.clone()), missing_content_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert!(backend.asked().is_empty());
}

#[tokio::test]
async fn e2e_status_is_always_ready() {
    let app = build_test_app(FakeBackend::failing());

    let (status, body) = send(app, get_request("/api/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "initialized": true, "status": "준비됨"}));
}

#[tokio::test]
async fn e2e_index_serves_chat_page() {
    let app = build_test_app(FakeBackend::failing());

    let response = app.oneshot(get_request("/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(std::str::from_utf8(&body).unwrap().contains("/api/chat"));
}

#[tokio::test]
async fn e2e_404_fallback_path_returns_not_found() {
    let app = build_test_app(FakeBackend::failing());

    let (status, body) = send(app, get_request("/api/unknown")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "error": "route not found"}));
}
