use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

const LATENCY_BUCKETS: [u64; 6] = [100, 500, 1_000, 5_000, 10_000, u64::MAX];
const BUCKET_MIDPOINTS: [f64; 6] = [50.0, 300.0, 750.0, 3_000.0, 7_500.0, 15_000.0];

/// Frame processing counters shared by every session.
pub struct ProcessingMetrics {
    frames: AtomicU64,
    no_face: AtomicU64,
    fallbacks: AtomicU64,
    rejected: AtomicU64,
    total_latency_us: AtomicU64,
    last_frame_at: AtomicI64,
    latency_buckets: [AtomicU64; 6],
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub frames: u64,
    pub no_face: u64,
    pub fallbacks: u64,
    pub rejected: u64,
    pub avg_latency_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
    pub last_frame_at: Option<i64>,
}

impl Default for ProcessingMetrics {
    fn default() -> Self {
        Self {
            frames: AtomicU64::new(0),
            no_face: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            last_frame_at: AtomicI64::new(0),
            latency_buckets: Default::default(),
        }
    }
}

impl ProcessingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&self, latency_us: u64, fallback: bool) {
        self.frames.fetch_add(1, Ordering::Relaxed);
        if fallback {
            self.fallbacks.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);
        self.record_latency_bucket(latency_us);
        self.last_frame_at
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn record_no_face(&self) {
        self.no_face.fetch_add(1, Ordering::Relaxed);
    }

    /// Out-of-order or otherwise refused frames.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency_bucket(&self, latency_us: u64) {
        for (i, &threshold) in LATENCY_BUCKETS.iter().enumerate() {
            if latency_us <= threshold {
                self.latency_buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
    }

    pub fn percentiles(&self) -> (f64, f64, f64) {
        let counts: Vec<u64> = self
            .latency_buckets
            .iter()
            .map(|b| b.load(Ordering::Relaxed))
            .collect();
        let total: u64 = counts.iter().sum();
        if total == 0 {
            return (0.0, 0.0, 0.0);
        }

        let percentile = |pct: f64| -> f64 {
            let target = (pct / 100.0 * total as f64).ceil() as u64;
            let mut cumulative = 0u64;
            for (i, &count) in counts.iter().enumerate() {
                cumulative += count;
                if cumulative >= target {
                    return BUCKET_MIDPOINTS[i];
                }
            }
            BUCKET_MIDPOINTS[5]
        };

        (percentile(50.0), percentile(95.0), percentile(99.0))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let frames = self.frames.load(Ordering::Relaxed);
        let total_latency = self.total_latency_us.load(Ordering::Relaxed);
        let (p50_us, p95_us, p99_us) = self.percentiles();
        let last = self.last_frame_at.load(Ordering::Relaxed);
        MetricsSnapshot {
            frames,
            no_face: self.no_face.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            avg_latency_us: if frames == 0 {
                0.0
            } else {
                total_latency as f64 / frames as f64
            },
            p50_us,
            p95_us,
            p99_us,
            last_frame_at: (last > 0).then_some(last),
        }
    }
}
