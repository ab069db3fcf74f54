use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::Router;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::monitor::SessionEvent;
use crate::response::AppError;
use crate::state::AppState;

static SSE_CONNECTION_COUNT: AtomicUsize = AtomicUsize::new(0);

struct SseGuard;
impl Drop for SseGuard {
    fn drop(&mut self) {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/:id/events", get(sse_handler))
}

/// Live stream of one session's processed frames until it is closed or evicted.
pub async fn sse_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let mut events = state.registry().subscribe(&id).await?;

    let max_sse = state.config().monitor.max_sse_connections;
    let current = SSE_CONNECTION_COUNT.fetch_add(1, Ordering::SeqCst);
    if current >= max_sse {
        SSE_CONNECTION_COUNT.fetch_sub(1, Ordering::SeqCst);
        return Err(AppError::too_many_requests("Too many SSE connections"));
    }

    let mut shutdown_rx = state.shutdown_rx();

    let stream = async_stream::stream! {
        let _guard = SseGuard;
        loop {
            tokio::select! {
                received = events.recv() => {
                    match received {
                        Ok(event) => {
                            let last = !matches!(event, SessionEvent::Frame(_));
                            if let Ok(json) = serde_json::to_string(&event) {
                                yield Ok(Event::default().event(event.name()).data(json));
                            }
                            if last {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(session_id = %id, skipped, "slow SSE subscriber skipped events");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
                _ = shutdown_rx.recv() => {
                    break;
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
