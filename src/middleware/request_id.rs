//! Request correlation.
//!
//! Every response echoes `x-request-id`. Error responses also carry it as `traceId`
//! in the JSON envelope, including plain-text rejections produced below the handlers.
//! Requests addressed to a session run in a span that names it, so a subject's
//! frames can be followed through the logs.

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::BodyExt;
use serde_json::{Map, Value};
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = client_request_id(req.headers())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let session_id = session_in_path(req.uri().path()).unwrap_or("-").to_string();

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        session_id = %session_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        let started = std::time::Instant::now();
        let mut response = next.run(req).await;
        let status = response.status();
        tracing::info!(
            status = status.as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        if status.is_client_error() || status.is_server_error() {
            response = with_trace_id(response, &request_id).await;
        }
        response
    }
    .instrument(span)
    .await
}

/// Client-supplied ids are kept when they are 1..=128 chars of `[A-Za-z0-9_-]`.
fn client_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| {
            (1..=128).contains(&id.len())
                && id
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        })
        .map(str::to_string)
}

/// Session id of `/api/sessions/{id}` and everything below it.
fn session_in_path(path: &str) -> Option<&str> {
    path.strip_prefix("/api/sessions/")
        .and_then(|rest| rest.split('/').next())
        .filter(|id| !id.is_empty())
}

/// Adds `traceId` to a JSON error envelope, or replaces a non-JSON error body
/// with one built from the status.
async fn with_trace_id(response: Response, request_id: &str) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let mut envelope = match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => map,
        _ => plain_envelope(parts.status, &String::from_utf8_lossy(&bytes)),
    };
    envelope.insert("traceId".to_string(), Value::String(request_id.to_string()));

    let patched = match serde_json::to_vec(&envelope) {
        Ok(patched) => patched,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Response::from_parts(parts, Body::from(patched))
}

fn plain_envelope(status: StatusCode, text: &str) -> Map<String, Value> {
    let message = match text.trim() {
        "" => status.canonical_reason().unwrap_or("Error").to_string(),
        text => text.to_string(),
    };
    let mut map = Map::new();
    map.insert("success".to_string(), Value::Bool(false));
    map.insert("code".to_string(), Value::from(code_for_status(status)));
    map.insert("message".to_string(), Value::String(message));
    map
}

fn code_for_status(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "INVALID_REQUEST_BODY",
        StatusCode::TOO_MANY_REQUESTS => "RATE_LIMITED",
        s if s.is_client_error() => "BAD_REQUEST",
        _ => "INTERNAL_ERROR",
    }
}
