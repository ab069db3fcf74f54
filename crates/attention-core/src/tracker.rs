//! Per-subject temporal state
//!
//! An [`AttentionTracker`] owns every buffer, detector and the calibration of exactly
//! one subject. Frames must be fed in timestamp order; the tracker itself does not
//! reorder or reject them.

use std::sync::Arc;

use crate::blink::BlinkDetector;
use crate::calibration::{CalibrationState, Calibrator};
use crate::classifier;
use crate::config::{AttentionConfig, NEUTRAL_GAZE, NEUTRAL_RATIO};
use crate::geometry;
use crate::types::{FrameOutcome, LandmarkFrame, MetricSnapshot};
use crate::window::{SmoothingBuffer, TrailingBuffers};
use crate::yawn::YawnDetector;

#[derive(Debug, Clone)]
pub struct AttentionTracker {
    cfg: Arc<AttentionConfig>,
    ear_smoothing: SmoothingBuffer,
    yaw_smoothing: SmoothingBuffer,
    pitch_smoothing: SmoothingBuffer,
    calibrator: Calibrator,
    blink: BlinkDetector,
    yawn: YawnDetector,
    buffers: TrailingBuffers,
    frames_processed: u64,
    last_timestamp: Option<f64>,
}

impl AttentionTracker {
    pub fn new(cfg: Arc<AttentionConfig>) -> Self {
        let t = &cfg.temporal;
        Self {
            ear_smoothing: SmoothingBuffer::new(t.ear_smoothing),
            yaw_smoothing: SmoothingBuffer::new(t.pose_smoothing),
            pitch_smoothing: SmoothingBuffer::new(t.pose_smoothing),
            calibrator: Calibrator::new(&cfg.calibration, &cfg.thresholds),
            blink: BlinkDetector::new(t.blink_min_frames),
            yawn: YawnDetector::new(cfg.thresholds.mar_yawn, t.yawn_min_duration_secs),
            buffers: TrailingBuffers::new(t),
            frames_processed: 0,
            last_timestamp: None,
            cfg,
        }
    }

    /// Advances the state by one frame and returns its metrics.
    ///
    /// An unusable frame yields the neutral snapshot and leaves all state untouched.
    pub fn process(&mut self, frame: &LandmarkFrame) -> MetricSnapshot {
        if let Err(err) = frame.validate() {
            tracing::debug!(error = %err, "frame rejected, reporting neutral metrics");
            return self.fallback(frame.timestamp);
        }

        let cfg = Arc::clone(&self.cfg);
        let ts = frame.timestamp;
        let raw = geometry::extract(frame, &cfg.landmarks);

        let ear = self.ear_smoothing.push(raw.ear);
        self.calibrator.add_sample(ear);
        let thresholds = self.calibrator.thresholds();

        let is_yawn = self.yawn.update(raw.mar, ts);

        // a failed solve reports a level head and does not enter the smoothing window
        let (yaw, pitch, roll) = match raw.pose {
            Some(pose) => (
                self.yaw_smoothing.push(pose.yaw),
                self.pitch_smoothing.push(pose.pitch),
                pose.roll,
            ),
            None => (0.0, 0.0, 0.0),
        };

        let is_blink = self.blink.update(ear, thresholds.low);

        self.buffers
            .push(ts, ear, is_blink, (raw.gaze.x, raw.gaze.y));
        let windowed = self.buffers.aggregate(ts, &cfg.temporal, thresholds.low);

        self.frames_processed += 1;
        self.last_timestamp = Some(ts);

        MetricSnapshot {
            timestamp: ts,
            ear,
            ear_raw: raw.ear,
            ear_baseline: self.calibrator.baseline(),
            calibrated: self.calibrator.is_complete(),
            mar: raw.mar,
            eye_opening: raw.eye_opening,
            yaw,
            pitch,
            roll,
            gaze_x: raw.gaze.x,
            gaze_y: raw.gaze.y,
            perclos: windowed.perclos,
            blink_rate: windowed.blink_rate,
            gaze_focus: windowed.gaze_focus,
            gaze_dispersion: windowed.gaze_dispersion,
            is_blink,
            is_yawn,
            total_blinks: self.blink.total(),
            total_yawns: self.yawn.total(),
            ear_thresholds: thresholds,
            fallback: false,
        }
    }

    /// Processes a frame and classifies the resulting snapshot.
    pub fn observe(&mut self, frame: &LandmarkFrame) -> FrameOutcome {
        let snapshot = self.process(frame);
        let result = classifier::classify(&snapshot, &self.cfg);
        FrameOutcome { snapshot, result }
    }

    fn fallback(&self, timestamp: f64) -> MetricSnapshot {
        let ts = if timestamp.is_finite() {
            timestamp
        } else {
            self.last_timestamp.unwrap_or(0.0)
        };
        MetricSnapshot {
            timestamp: ts,
            ear: NEUTRAL_RATIO,
            ear_raw: NEUTRAL_RATIO,
            ear_baseline: self.calibrator.baseline(),
            calibrated: self.calibrator.is_complete(),
            mar: NEUTRAL_RATIO,
            eye_opening: NEUTRAL_RATIO,
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            gaze_x: NEUTRAL_GAZE,
            gaze_y: NEUTRAL_GAZE,
            perclos: 0.0,
            blink_rate: 0.0,
            gaze_focus: 1.0,
            gaze_dispersion: 0.0,
            is_blink: false,
            is_yawn: false,
            total_blinks: self.blink.total(),
            total_yawns: self.yawn.total(),
            ear_thresholds: self.calibrator.thresholds(),
            fallback: true,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrator.is_complete()
    }

    pub fn calibration(&self) -> CalibrationState {
        self.calibrator.state()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn total_blinks(&self) -> u64 {
        self.blink.total()
    }

    pub fn total_yawns(&self) -> u64 {
        self.yawn.total()
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.cfg
    }
}
