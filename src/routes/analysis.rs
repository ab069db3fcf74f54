use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;

use crate::analysis::analyze_frames;
use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::routes::sessions::ReportView;
use crate::state::AppState;
use crate::store::operations::frames::FrameRecord;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(analyze))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    frames: Vec<FrameRecord>,
    #[serde(default)]
    min_distraction_frames: Option<usize>,
}

/// Stateless analysis of caller-supplied frame rows.
async fn analyze(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<AnalyzeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let min = req
        .min_distraction_frames
        .unwrap_or(state.config().monitor.min_distraction_frames);
    let report = analyze_frames(&req.frames, min)?;
    Ok(ok(ReportView::new(report)))
}
