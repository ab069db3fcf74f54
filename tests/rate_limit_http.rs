mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use attention_core::synthetic::FaceBuilder;
use common::app::{spawn_test_server_with_limit, spawn_with, TestOptions};
use common::frames::{frame_body, frame_path};
use common::http::{request, response_json};

#[tokio::test]
async fn it_rate_limit_triggers_429_with_headers() {
    let app = spawn_test_server_with_limit(3).await;

    let mut final_status = StatusCode::OK;
    let mut final_headers = axum::http::HeaderMap::new();
    let mut final_body = json!({});

    for _ in 0..4 {
        let response = request(
            &app.app,
            Method::POST,
            "/api/sessions",
            Some(json!({})),
            &[],
        )
        .await;

        let (status, headers, body) = response_json(response).await;
        final_status = status;
        final_headers = headers;
        final_body = body;
    }

    assert_eq!(final_status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(final_body["code"], "RATE_LIMITED");
    assert!(final_headers.get("retry-after").is_some());
    assert!(final_headers.get("ratelimit-limit").is_some());
    assert!(final_headers.get("ratelimit-remaining").is_some());
    assert!(final_headers.get("ratelimit-reset").is_some());
}

#[tokio::test]
async fn it_health_is_not_rate_limited() {
    let app = spawn_test_server_with_limit(1).await;

    for _ in 0..5 {
        let response = request(&app.app, Method::GET, "/health/live", None, &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn it_frame_budget_is_per_session() {
    let app = spawn_with(TestOptions {
        frame_limit: 2,
        ..TestOptions::default()
    })
    .await;
    let face = FaceBuilder::new();

    for n in 0..2 {
        let response = request(&app.app, Method::POST, &frame_path("a"), Some(frame_body(n, &face)), &[]).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = request(&app.app, Method::POST, &frame_path("a"), Some(frame_body(2, &face)), &[]).await;
    let (status, headers, body) = response_json(response).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "FRAME_RATE_LIMITED");
    assert_eq!(headers["ratelimit-remaining"], "0");

    // another subject on the same address keeps its own budget
    let response = request(&app.app, Method::POST, &frame_path("b"), Some(frame_body(0, &face)), &[]).await;
    assert_eq!(response.status(), StatusCode::OK);

    // and the client budget is untouched by frames
    let response = request(&app.app, Method::GET, "/api/sessions/a", None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
}
