//! Trailing buffers and the windowed aggregates computed over them
//!
//! [`TimedBuffer`] is capacity-capped and drops entries older than its retention on
//! push; shorter windows are read through [`TimedBuffer::since`] without copying.

use std::collections::VecDeque;

use crate::config::TemporalConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timed<T> {
    pub ts: f64,
    pub value: T,
}

#[derive(Debug, Clone)]
pub struct TimedBuffer<T> {
    entries: VecDeque<Timed<T>>,
    capacity: usize,
    retention_secs: f64,
}

impl<T> TimedBuffer<T> {
    pub fn new(capacity: usize, retention_secs: f64) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            retention_secs,
        }
    }

    pub fn push(&mut self, ts: f64, value: T) {
        let cutoff = ts - self.retention_secs;
        while let Some(front) = self.entries.front() {
            if front.ts <= cutoff || self.entries.len() >= self.capacity {
                self.entries.pop_front();
            } else {
                break;
            }
        }
        self.entries.push_back(Timed { ts, value });
    }

    /// Entries strictly newer than `now - window`.
    pub fn since(&self, now: f64, window: f64) -> impl Iterator<Item = &Timed<T>> + '_ {
        let cutoff = now - window;
        // entries are pushed in timestamp order, so the window is a suffix
        let start = self.entries.partition_point(|e| e.ts <= cutoff);
        self.entries.range(start..)
    }

    pub fn first_ts(&self) -> Option<f64> {
        self.entries.front().map(|e| e.ts)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fixed-size FIFO whose mean is the smoothed value.
#[derive(Debug, Clone)]
pub struct SmoothingBuffer {
    values: VecDeque<f64>,
    size: usize,
}

impl SmoothingBuffer {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            values: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Pushes a sample and returns the mean of the buffer.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.values.len() == self.size {
            self.values.pop_front();
        }
        self.values.push_back(value);
        self.mean().unwrap_or(value)
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result of the windowed aggregation for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowedMetrics {
    pub perclos: f64,
    pub blink_rate: f64,
    pub gaze_focus: f64,
    pub gaze_dispersion: f64,
}

/// Trailing history of one subject.
#[derive(Debug, Clone)]
pub struct TrailingBuffers {
    pub ear: TimedBuffer<f64>,
    pub blinks: TimedBuffer<bool>,
    pub gaze: TimedBuffer<(f64, f64)>,
    pub timestamps: TimedBuffer<()>,
}

impl TrailingBuffers {
    pub fn new(cfg: &TemporalConfig) -> Self {
        let retention = cfg.retention_secs();
        Self {
            ear: TimedBuffer::new(cfg.buffer_capacity, retention),
            blinks: TimedBuffer::new(cfg.buffer_capacity, retention),
            gaze: TimedBuffer::new(cfg.buffer_capacity, retention),
            timestamps: TimedBuffer::new(cfg.buffer_capacity, retention),
        }
    }

    pub fn push(&mut self, ts: f64, ear: f64, blink: bool, gaze: (f64, f64)) {
        self.ear.push(ts, ear);
        self.blinks.push(ts, blink);
        self.gaze.push(ts, gaze);
        self.timestamps.push(ts, ());
    }

    /// Share of EAR samples in the PERCLOS window below `low_threshold`.
    pub fn perclos(&self, now: f64, window: f64, low_threshold: f64) -> f64 {
        let (closed, total) = self
            .ear
            .since(now, window)
            .fold((0usize, 0usize), |(closed, total), e| {
                (closed + usize::from(e.value < low_threshold), total + 1)
            });
        if total == 0 {
            return 0.0;
        }
        closed as f64 / total as f64
    }

    /// Blinks per minute. The denominator is the time since the earliest retained
    /// timestamp, clamped to `[min_elapsed, max_elapsed]`.
    pub fn blink_rate(&self, now: f64, cfg: &TemporalConfig) -> f64 {
        if self.timestamps.len() < 2 {
            return 0.0;
        }
        let Some(first) = self.timestamps.first_ts() else {
            return 0.0;
        };
        let count = self
            .blinks
            .since(now, cfg.blink_window_secs)
            .filter(|e| e.value)
            .count();
        let elapsed = (now - first).clamp(
            cfg.blink_rate_min_elapsed_secs,
            cfg.blink_rate_max_elapsed_secs,
        );
        count as f64 / elapsed * 60.0
    }

    /// (focus, dispersion) from the population variance of gaze in the short window.
    pub fn gaze_stability(&self, now: f64, cfg: &TemporalConfig) -> (f64, f64) {
        let (n, sx, sy) = self
            .gaze
            .since(now, cfg.gaze_window_secs)
            .fold((0usize, 0.0, 0.0), |(n, sx, sy), e| {
                (n + 1, sx + e.value.0, sy + e.value.1)
            });
        if n == 0 {
            return (1.0, 0.0);
        }
        let (mx, my) = (sx / n as f64, sy / n as f64);
        let (vx, vy) = self
            .gaze
            .since(now, cfg.gaze_window_secs)
            .fold((0.0, 0.0), |(vx, vy), e| {
                (vx + (e.value.0 - mx).powi(2), vy + (e.value.1 - my).powi(2))
            });
        let dispersion = (vx / n as f64 + vy / n as f64) * cfg.gaze_dispersion_scale;
        let focus = 1.0 - (dispersion / cfg.gaze_dispersion_ceiling).clamp(0.0, 1.0);
        (focus, dispersion)
    }

    pub fn aggregate(&self, now: f64, cfg: &TemporalConfig, low_threshold: f64) -> WindowedMetrics {
        let (gaze_focus, gaze_dispersion) = self.gaze_stability(now, cfg);
        WindowedMetrics {
            perclos: self.perclos(now, cfg.perclos_window_secs, low_threshold),
            blink_rate: self.blink_rate(now, cfg),
            gaze_focus,
            gaze_dispersion,
        }
    }
}
