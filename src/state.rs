use std::sync::Arc;
use std::time::Instant;

use attention_core::AttentionConfig;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::middleware::rate_limit::RateLimitState;
use crate::monitor::SessionRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    rate_limit: Arc<RateLimitState>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        attention: Arc<AttentionConfig>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            store.clone(),
            attention,
            &config.monitor,
        ));
        let rate_limit = Arc::new(RateLimitState::new(&config.rate_limit));

        Self {
            store,
            registry,
            rate_limit,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn rate_limit(&self) -> &Arc<RateLimitState> {
        &self.rate_limit
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(tx: broadcast::Sender<()>) -> (tempfile::TempDir, AppState) {
        let cfg = Config::from_env();
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(
            Store::open(tmp.path().join("state.sled").to_str().expect("path")).expect("store"),
        );
        let attention = Arc::new(cfg.attention.to_attention_config());
        (tmp, AppState::new(store, attention, &cfg, tx))
    }

    #[tokio::test]
    async fn registry_starts_empty() {
        let (tx, _) = broadcast::channel(4);
        let (_tmp, state) = state(tx);
        assert_eq!(state.registry().active_count().await, 0);
        assert_eq!(
            state.registry().attention_config().calibration.sample_count,
            state.config().attention.calibration_frames
        );
    }

    #[tokio::test]
    async fn shutdown_receiver_can_clone() {
        let (tx, _) = broadcast::channel(4);
        let (_tmp, state) = state(tx.clone());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.shutdown_rx();
        tx.send(()).expect("send");
        rx1.recv().await.expect("rx1");
        rx2.recv().await.expect("rx2");
    }
}
