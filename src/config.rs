use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use attention_core::AttentionConfig;

use crate::analysis::DEFAULT_MIN_DISTRACTION_FRAMES;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cors_origin: String,
    pub trust_proxy: bool,
    pub body_limit_bytes: usize,
    pub rate_limit: RateLimitConfig,
    pub worker: WorkerConfig,
    pub monitor: MonitorConfig,
    pub attention: AttentionEnvConfig,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    /// Per client address, every `/api` call except frame ingestion.
    pub max_requests: u64,
    /// Per session, frames posted within one window.
    pub max_frames: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub eviction_interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub max_sessions: usize,
    pub session_idle_ttl_secs: u64,
    pub persist_frames: bool,
    pub min_distraction_frames: usize,
    pub event_buffer: usize,
    pub max_sse_connections: usize,
}

/// Environment overrides applied on top of the default attention tables.
#[derive(Debug, Clone)]
pub struct AttentionEnvConfig {
    pub calibration_frames: usize,
    pub yawn_min_duration_secs: f64,
    pub blink_min_frames: u32,
}

impl AttentionEnvConfig {
    pub fn to_attention_config(&self) -> AttentionConfig {
        let mut cfg = AttentionConfig::default();
        cfg.calibration.sample_count = self.calibration_frames;
        cfg.temporal.yawn_min_duration_secs = self.yawn_min_duration_secs;
        cfg.temporal.blink_min_frames = self.blink_min_frames;
        cfg
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/attention.sled"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            trust_proxy: env_or_bool("TRUST_PROXY", false),
            body_limit_bytes: env_or_parse("BODY_LIMIT_BYTES", 2 * 1024 * 1024_usize),
            rate_limit: RateLimitConfig {
                window_secs: env_or_parse("RATE_LIMIT_WINDOW_SECS", 60_u64),
                max_requests: env_or_parse("RATE_LIMIT_MAX", 600_u64),
                max_frames: env_or_parse("RATE_LIMIT_MAX_FRAMES", 3600_u64),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                eviction_interval_secs: env_or_parse("EVICTION_INTERVAL_SECS", 60_u64),
            },
            monitor: MonitorConfig {
                max_sessions: env_or_parse("MAX_SESSIONS", 256_usize),
                session_idle_ttl_secs: env_or_parse("SESSION_IDLE_TTL_SECS", 300_u64),
                persist_frames: env_or_bool("PERSIST_FRAMES", true),
                min_distraction_frames: env_or_parse(
                    "MIN_DISTRACTION_FRAMES",
                    DEFAULT_MIN_DISTRACTION_FRAMES,
                ),
                event_buffer: env_or_parse("SESSION_EVENT_BUFFER", 64_usize),
                max_sse_connections: env_or_parse("MAX_SSE_CONNECTIONS", 128_usize),
            },
            attention: AttentionEnvConfig {
                calibration_frames: env_or_parse("CALIBRATION_FRAMES", 60_usize),
                yawn_min_duration_secs: env_or_parse("YAWN_MIN_DURATION_SECS", 1.5_f64),
                blink_min_frames: env_or_parse("BLINK_MIN_FRAMES", 2_u32),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
