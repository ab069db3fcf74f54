use crate::middleware::rate_limit::RateLimitState;

pub async fn run(state: &RateLimitState) {
    let swept = state.sweep().await;
    let tracked = state.tracked().await;
    tracing::debug!(swept, tracked, "rate_limit_cleanup: done");
}
