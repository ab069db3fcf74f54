use attention_core::CalibrationState;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::analysis::{render_report, SessionReport};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::sessions::SessionRecord;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_session))
        .route("/:id", get(get_session).delete(close_session))
        .route("/:id/report", get(session_report))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenSessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    session: SessionRecord,
    live: bool,
    calibration: Option<CalibrationState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportView {
    pub report: SessionReport,
    pub summary: String,
}

impl ReportView {
    pub(crate) fn new(report: SessionReport) -> Self {
        let summary = render_report(&report);
        Self { report, summary }
    }
}

async fn open_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<OpenSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session_id = req
        .session_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let record = state.registry().open(&session_id).await?;
    Ok(created(record))
}

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = state
        .store()
        .get_session(&id)?
        .ok_or_else(|| AppError::not_found("SESSION_NOT_FOUND", "Session not found"))?;
    let calibration = state.registry().calibration(&id).await;

    Ok(ok(SessionView {
        session,
        live: calibration.is_some(),
        calibration,
    }))
}

async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let record = state.registry().close(&id).await?;
    Ok(ok(record))
}

async fn session_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.store().get_session(&id)?.is_none() {
        return Err(AppError::not_found("SESSION_NOT_FOUND", "Session not found"));
    }
    let report = state.registry().report(&id)?;
    Ok(ok(ReportView::new(report)))
}
