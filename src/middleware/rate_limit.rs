//! Fixed-window admission for `/api`.
//!
//! Frame ingestion is budgeted per session, so a subject streaming at camera rate
//! never starves another subject behind the same address. Every other call is
//! budgeted per client address.

use std::collections::HashMap;
use std::hash::Hash;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio::sync::Mutex;

use crate::config::RateLimitConfig;
use crate::response::ErrorBody;
use crate::state::AppState;

/// What a request is charged against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Budget {
    Client(IpAddr),
    Frames(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Seconds until the current window closes.
    pub reset_after: u64,
}

#[derive(Debug)]
struct Window {
    used: u64,
    opened: Instant,
}

#[derive(Debug)]
pub struct FixedWindow<K> {
    length: Duration,
    limit: u64,
    windows: Mutex<HashMap<K, Window>>,
}

impl<K: Hash + Eq> FixedWindow<K> {
    pub fn new(length: Duration, limit: u64) -> Self {
        Self {
            length,
            limit,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub async fn admit(&self, key: K) -> Verdict {
        self.admit_at(key, Instant::now()).await
    }

    async fn admit_at(&self, key: K, now: Instant) -> Verdict {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(key).or_insert(Window { used: 0, opened: now });
        if now.saturating_duration_since(window.opened) >= self.length {
            *window = Window { used: 0, opened: now };
        }

        let allowed = window.used < self.limit;
        if allowed {
            window.used += 1;
        }
        let left = self
            .length
            .saturating_sub(now.saturating_duration_since(window.opened));

        Verdict {
            allowed,
            limit: self.limit,
            remaining: self.limit - window.used,
            reset_after: left.as_secs_f64().ceil() as u64,
        }
    }

    /// Drops windows that closed at least one full length ago. Returns how many.
    pub async fn sweep(&self) -> usize {
        self.sweep_at(Instant::now()).await
    }

    async fn sweep_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.opened) < self.length * 2);
        before - windows.len()
    }

    pub async fn tracked(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[derive(Debug)]
pub struct RateLimitState {
    clients: FixedWindow<IpAddr>,
    frames: FixedWindow<String>,
}

impl RateLimitState {
    pub fn new(config: &RateLimitConfig) -> Self {
        let length = Duration::from_secs(config.window_secs.max(1));
        Self {
            clients: FixedWindow::new(length, config.max_requests),
            frames: FixedWindow::new(length, config.max_frames),
        }
    }

    pub async fn admit(&self, budget: Budget) -> Verdict {
        match budget {
            Budget::Client(ip) => self.clients.admit(ip).await,
            Budget::Frames(session_id) => self.frames.admit(session_id).await,
        }
    }

    pub async fn sweep(&self) -> usize {
        self.clients.sweep().await + self.frames.sweep().await
    }

    pub async fn tracked(&self) -> usize {
        self.clients.tracked().await + self.frames.tracked().await
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let budget = budget_for(
        req.method(),
        req.uri().path(),
        req.headers(),
        state.config().trust_proxy,
    );
    let code = match &budget {
        Budget::Client(_) => "RATE_LIMITED",
        Budget::Frames(_) => "FRAME_RATE_LIMITED",
    };
    let verdict = state.rate_limit().admit(budget).await;

    let mut response = if verdict.allowed {
        next.run(req).await
    } else {
        tracing::warn!(code, limit = verdict.limit, "request over budget");
        let mut rejected = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody {
                success: false,
                code: code.to_string(),
                message: "Too many requests".to_string(),
                trace_id: None,
            }),
        )
            .into_response();
        rejected
            .headers_mut()
            .insert("retry-after", HeaderValue::from(verdict.reset_after));
        rejected
    };

    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", HeaderValue::from(verdict.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(verdict.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(verdict.reset_after));
    response
}

/// `POST …/sessions/{id}/frames` is charged to the session, anything else to the client.
/// Accepts the path with or without the `/api` prefix.
pub fn budget_for(method: &Method, path: &str, headers: &HeaderMap, trust_proxy: bool) -> Budget {
    let path = path.strip_prefix("/api").unwrap_or(path);
    let mut segments = path.trim_matches('/').split('/');
    if method == Method::POST {
        if let (Some("sessions"), Some(id), Some("frames"), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) {
            if !id.is_empty() {
                return Budget::Frames(id.to_string());
            }
        }
    }
    Budget::Client(client_ip(headers, trust_proxy))
}

/// `x-forwarded-for` is honoured only behind a trusted proxy; `x-real-ip` otherwise.
pub fn client_ip(headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    trust_proxy
        .then(|| header_ip("x-forwarded-for"))
        .flatten()
        .or_else(|| header_ip("x-real-ip"))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
