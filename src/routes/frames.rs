use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;

use attention_core::Point3;

use crate::extractors::JsonBody;
use crate::monitor::FrameInput;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:id/frames", post(process_frame))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessFrameRequest {
    frame_number: u64,
    /// Capture time in seconds; the server clock is used when absent.
    #[serde(default)]
    timestamp: Option<f64>,
    width: f64,
    height: f64,
    #[serde(default)]
    landmarks: Option<Vec<[f64; 3]>>,
}

impl ProcessFrameRequest {
    fn into_input(self) -> FrameInput {
        let timestamp = self.timestamp.unwrap_or_else(wall_clock_secs);
        FrameInput {
            frame_number: self.frame_number,
            timestamp,
            width: self.width,
            height: self.height,
            landmarks: self
                .landmarks
                .map(|points| points.into_iter().map(Point3::from).collect()),
        }
    }
}

fn wall_clock_secs() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

async fn process_frame(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<ProcessFrameRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state
        .registry()
        .process_frame(&id, req.into_input())
        .await?;
    Ok(ok(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_timestamp_uses_wall_clock() {
        let req: ProcessFrameRequest = serde_json::from_value(serde_json::json!({
            "frameNumber": 1,
            "width": 640,
            "height": 480
        }))
        .expect("request");
        let before = wall_clock_secs();
        let input = req.into_input();
        assert!(input.timestamp >= before);
        assert!(input.landmarks.is_none());
    }

    #[test]
    fn landmark_triples_become_points() {
        let req: ProcessFrameRequest = serde_json::from_value(serde_json::json!({
            "frameNumber": 2,
            "timestamp": 0.5,
            "width": 640,
            "height": 480,
            "landmarks": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]
        }))
        .expect("request");
        let input = req.into_input();
        assert_eq!(input.timestamp, 0.5);
        let points = input.landmarks.expect("points");
        assert_eq!(points[1], Point3::new(4.0, 5.0, 6.0));
    }
}
