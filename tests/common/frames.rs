use attention_core::synthetic::FaceBuilder;
use serde_json::{json, Value};

pub const FPS: f64 = 30.0;

/// JSON body for `POST /api/sessions/:id/frames`.
pub fn frame_body(frame_number: u64, face: &FaceBuilder) -> Value {
    let frame = face.frame(frame_number as f64 / FPS);
    let landmarks: Vec<[f64; 3]> = frame.points.iter().map(|p| [p.x, p.y, p.z]).collect();
    json!({
        "frameNumber": frame_number,
        "timestamp": frame.timestamp,
        "width": frame.width,
        "height": frame.height,
        "landmarks": landmarks,
    })
}

pub fn no_face_body(frame_number: u64) -> Value {
    json!({
        "frameNumber": frame_number,
        "timestamp": frame_number as f64 / FPS,
        "width": 640,
        "height": 480,
    })
}

pub fn frame_path(session_id: &str) -> String {
    format!("/api/sessions/{session_id}/frames")
}
