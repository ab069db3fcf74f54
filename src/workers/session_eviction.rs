use std::time::Duration;

use crate::monitor::SessionRegistry;

pub async fn run(registry: &SessionRegistry, idle_ttl: Duration) {
    tracing::debug!("session_eviction: start");
    match registry.evict_idle(idle_ttl).await {
        Ok(0) => tracing::debug!("session_eviction: nothing idle"),
        Ok(count) => tracing::info!(evicted = count, "session_eviction: done"),
        Err(e) => tracing::error!(error = %e, "session_eviction failed"),
    }
}
