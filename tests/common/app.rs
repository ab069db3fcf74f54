use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use attention_monitor::config::{
    AttentionEnvConfig, Config, MonitorConfig, RateLimitConfig, WorkerConfig,
};
use attention_monitor::routes::build_router;
use attention_monitor::state::AppState;
use attention_monitor::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    _temp_dir: TempDir,
}

pub struct TestOptions {
    pub api_limit: u64,
    pub frame_limit: u64,
    pub max_sessions: usize,
    pub persist_frames: bool,
    pub body_limit_bytes: usize,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            api_limit: 10_000,
            frame_limit: 10_000,
            max_sessions: 16,
            persist_frames: true,
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

pub async fn spawn_with(options: TestOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("attention-test.sled");

    // build Config directly so parallel tests never race on env vars
    let config = Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string_lossy().to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        trust_proxy: false,
        body_limit_bytes: options.body_limit_bytes,
        rate_limit: RateLimitConfig {
            window_secs: 60,
            max_requests: options.api_limit,
            max_frames: options.frame_limit,
        },
        worker: WorkerConfig {
            is_leader: false,
            eviction_interval_secs: 60,
        },
        monitor: MonitorConfig {
            max_sessions: options.max_sessions,
            session_idle_ttl_secs: 300,
            persist_frames: options.persist_frames,
            min_distraction_frames: 30,
            event_buffer: 64,
            max_sse_connections: 16,
        },
        attention: AttentionEnvConfig {
            calibration_frames: 60,
            yawn_min_duration_secs: 1.5,
            blink_min_frames: 2,
        },
    };

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    let attention = Arc::new(config.attention.to_attention_config());
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(store, attention, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_server() -> TestApp {
    spawn_with(TestOptions::default()).await
}

pub async fn spawn_test_server_with_limit(api_limit: u64) -> TestApp {
    spawn_with(TestOptions {
        api_limit,
        ..TestOptions::default()
    })
    .await
}
