mod common;

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::app::spawn_test_server;
use common::http::{assert_json_error, assert_status_ok_json, send_json};

fn row(n: u64, level: &str, score: f64) -> Value {
    json!({
        "frameNumber": n,
        "elapsedSeconds": n as f64 / 10.0,
        "attentionScore": score,
        "attentionLevel": level,
        "ear": 0.3,
        "headYaw": -4.0,
        "isBlink": n % 10 == 0,
    })
}

#[tokio::test]
async fn it_analysis_reports_distraction_periods() {
    let app = spawn_test_server().await;

    let mut frames: Vec<Value> = (0..10).map(|n| row(n, "CONCENTRATED", 90.0)).collect();
    frames.extend((10..16).map(|n| row(n, "NOT_CONCENTRATED", 20.0)));
    frames.extend((16..20).map(|n| row(n, "LOW_ATTENTION", 55.0)));

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/analysis",
        Some(json!({ "frames": frames, "minDistractionFrames": 5 })),
    )
    .await;
    assert_status_ok_json(status, &body);

    let report = &body["data"]["report"];
    assert_eq!(report["totalFrames"], 20);
    assert_eq!(report["totalBlinks"], 2);
    assert_eq!(report["attentionDistribution"]["concentrated"], 50.0);
    assert_eq!(report["attentionDistribution"]["notConcentrated"], 30.0);
    assert_eq!(report["attentionDistribution"]["lowAttention"], 20.0);
    assert_eq!(report["metricAverages"]["headYaw"], 4.0);

    let periods = report["distractionPeriods"].as_array().expect("periods");
    assert_eq!(periods.len(), 1);
    assert_eq!(periods[0]["startFrame"], 10);
    assert_eq!(periods[0]["endFrame"], 15);
    assert_eq!(periods[0]["durationFrames"], 6);

    assert!(body["data"]["summary"]
        .as_str()
        .expect("summary")
        .contains("ATTENTION REPORT"));
}

#[tokio::test]
async fn it_analysis_uses_configured_minimum_by_default() {
    let app = spawn_test_server().await;

    // six distracted frames stay below the default minimum of thirty
    let frames: Vec<Value> = (0..6).map(|n| row(n, "NOT_CONCENTRATED", 10.0)).collect();
    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/analysis",
        Some(json!({ "frames": frames })),
    )
    .await;
    assert_status_ok_json(status, &body);
    assert_eq!(
        body["data"]["report"]["distractionPeriods"]
            .as_array()
            .expect("periods")
            .len(),
        0
    );
}

#[tokio::test]
async fn it_analysis_of_no_frames_is_bad_request() {
    let app = spawn_test_server().await;

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/analysis",
        Some(json!({ "frames": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "NO_FRAMES");
}

#[tokio::test]
async fn it_analysis_rejects_unknown_level() {
    let app = spawn_test_server().await;

    let (status, body) = send_json(
        &app.app,
        Method::POST,
        "/api/analysis",
        Some(json!({ "frames": [row(0, "SLEEPY", 10.0)] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_json_error(&body, "INVALID_REQUEST_BODY");
}
