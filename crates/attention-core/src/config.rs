//! Threshold, window and weight tables
//!
//! All tunables of the engine live here. A single `AttentionConfig` is built once,
//! validated, wrapped in `Arc` and shared read-only by every subject tracker.

use serde::{Deserialize, Serialize};

use crate::types::Metric;

/// Value returned by ratio extractors when the geometry is degenerate.
pub const NEUTRAL_RATIO: f64 = 0.30;

/// Gaze position reported when the iris landmarks are missing.
pub const NEUTRAL_GAZE: f64 = 0.5;

/// Horizontal distances below this are treated as degenerate.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Face-mesh anchor indices consumed by the geometry formulas.
///
/// Defaults follow the 478-point refined MediaPipe face mesh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkIndices {
    /// Left eye contour: inner corner, two upper lid points, outer corner, two lower lid points
    pub left_eye: [usize; 6],
    /// Right eye contour, same ordering as `left_eye`
    pub right_eye: [usize; 6],
    pub iris_left: usize,
    pub iris_right: usize,
    pub mouth_top: usize,
    pub mouth_bottom: usize,
    pub mouth_left: usize,
    pub mouth_right: usize,
    pub nose: usize,
    pub chin: usize,
    pub pose_eye_left: usize,
    pub pose_eye_right: usize,
    pub pose_mouth_left: usize,
    pub pose_mouth_right: usize,
}

impl Default for LandmarkIndices {
    fn default() -> Self {
        Self {
            left_eye: [362, 385, 387, 263, 373, 380],
            right_eye: [33, 160, 158, 133, 153, 144],
            iris_left: 468,
            iris_right: 473,
            mouth_top: 13,
            mouth_bottom: 14,
            mouth_left: 78,
            mouth_right: 308,
            nose: 1,
            chin: 199,
            pose_eye_left: 263,
            pose_eye_right: 33,
            pose_mouth_left: 291,
            pose_mouth_right: 61,
        }
    }
}

impl LandmarkIndices {
    /// Highest index referenced by any formula.
    pub fn max_index(&self) -> usize {
        self.left_eye
            .iter()
            .chain(self.right_eye.iter())
            .copied()
            .chain([
                self.iris_left,
                self.iris_right,
                self.mouth_top,
                self.mouth_bottom,
                self.mouth_left,
                self.mouth_right,
                self.nose,
                self.chin,
                self.pose_eye_left,
                self.pose_eye_right,
                self.pose_mouth_left,
                self.pose_mouth_right,
            ])
            .max()
            .unwrap_or(0)
    }
}

/// Physiological thresholds used by the detectors and the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub ear_concentrated: f64,
    pub ear_low: f64,
    pub ear_severe: f64,
    pub perclos_concentrated: f64,
    pub perclos_severe: f64,
    /// Lower edge of the attentive blink band (blinks/min)
    pub blink_concentrated_min: f64,
    /// Upper edge of the attentive blink band (blinks/min)
    pub blink_concentrated_max: f64,
    pub blink_severe: f64,
    pub yaw_concentrated: f64,
    pub yaw_severe: f64,
    pub pitch_concentrated: f64,
    pub pitch_severe: f64,
    pub gaze_focus_concentrated: f64,
    pub gaze_focus_severe: f64,
    pub gaze_dispersion_concentrated: f64,
    pub gaze_dispersion_severe: f64,
    pub eye_opening_concentrated: f64,
    pub eye_opening_severe: f64,
    /// Above this MAR the subject is assumed to be speaking
    pub mar_speaking: f64,
    /// Above this MAR a yawn dwell timer starts
    pub mar_yawn: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            ear_concentrated: 0.24,
            ear_low: 0.19,
            ear_severe: 0.16,
            perclos_concentrated: 0.20,
            perclos_severe: 0.40,
            blink_concentrated_min: 5.0,
            blink_concentrated_max: 22.0,
            blink_severe: 32.0,
            yaw_concentrated: 12.0,
            yaw_severe: 22.0,
            pitch_concentrated: 12.0,
            pitch_severe: 20.0,
            gaze_focus_concentrated: 0.55,
            gaze_focus_severe: 0.35,
            gaze_dispersion_concentrated: 30.0,
            gaze_dispersion_severe: 60.0,
            eye_opening_concentrated: 0.26,
            eye_opening_severe: 0.20,
            mar_speaking: 0.55,
            mar_yawn: 0.75,
        }
    }
}

/// One-shot EAR calibration parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationConfig {
    pub sample_count: usize,
    /// Share of the highest samples averaged into the baseline
    pub top_fraction: f64,
    pub baseline_floor: f64,
    pub concentrated_pct: f64,
    pub low_pct: f64,
    pub severe_pct: f64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: 60,
            top_fraction: 0.70,
            baseline_floor: 0.20,
            concentrated_pct: 0.85,
            low_pct: 0.70,
            severe_pct: 0.55,
        }
    }
}

/// Windows, buffer sizes and debounce parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporalConfig {
    pub perclos_window_secs: f64,
    pub blink_window_secs: f64,
    pub gaze_window_secs: f64,
    pub blink_min_frames: u32,
    pub yawn_min_duration_secs: f64,
    pub buffer_capacity: usize,
    pub ear_smoothing: usize,
    pub pose_smoothing: usize,
    pub blink_rate_min_elapsed_secs: f64,
    pub blink_rate_max_elapsed_secs: f64,
    pub gaze_dispersion_scale: f64,
    pub gaze_dispersion_ceiling: f64,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            perclos_window_secs: 60.0,
            blink_window_secs: 60.0,
            gaze_window_secs: 1.0,
            blink_min_frames: 2,
            yawn_min_duration_secs: 1.5,
            buffer_capacity: 1800,
            ear_smoothing: 5,
            pose_smoothing: 7,
            blink_rate_min_elapsed_secs: 1.0,
            blink_rate_max_elapsed_secs: 60.0,
            gaze_dispersion_scale: 1000.0,
            gaze_dispersion_ceiling: 300.0,
        }
    }
}

impl TemporalConfig {
    /// Largest window any aggregate looks back over; older entries can be evicted.
    pub fn retention_secs(&self) -> f64 {
        self.perclos_window_secs
            .max(self.blink_window_secs)
            .max(self.gaze_window_secs)
    }
}

/// Per-metric weights of the aggregate score.
///
/// Yaw and pitch are weighted independently, so head pose may contribute up to 0.30.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weights {
    pub ear: f64,
    pub perclos: f64,
    pub blink_rate: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub gaze_focus: f64,
    pub gaze_dispersion: f64,
    pub eye_opening: f64,
    pub mar: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            ear: 0.20,
            perclos: 0.20,
            blink_rate: 0.15,
            yaw: 0.15,
            pitch: 0.15,
            gaze_focus: 0.15,
            gaze_dispersion: 0.05,
            eye_opening: 0.05,
            mar: 0.05,
        }
    }
}

impl Weights {
    pub fn for_metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Ear => self.ear,
            Metric::Perclos => self.perclos,
            Metric::BlinkRate => self.blink_rate,
            Metric::Yaw => self.yaw,
            Metric::Pitch => self.pitch,
            Metric::GazeFocus => self.gaze_focus,
            Metric::GazeDispersion => self.gaze_dispersion,
            Metric::EyeOpening => self.eye_opening,
            Metric::Mar => self.mar,
        }
    }

    fn as_array(&self) -> [f64; 9] {
        [
            self.ear,
            self.perclos,
            self.blink_rate,
            self.yaw,
            self.pitch,
            self.gaze_focus,
            self.gaze_dispersion,
            self.eye_opening,
            self.mar,
        ]
    }
}

/// Final decision cut-offs, evaluated in priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionConfig {
    pub looking_away_score_cap: f64,
    pub not_concentrated_severe_count: usize,
    pub not_concentrated_score: f64,
    pub low_attention_severe_count: usize,
    pub low_attention_low_count: usize,
    pub low_attention_score: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            looking_away_score_cap: 55.0,
            not_concentrated_severe_count: 3,
            not_concentrated_score: 45.0,
            low_attention_severe_count: 1,
            low_attention_low_count: 4,
            low_attention_score: 70.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionConfig {
    #[serde(default)]
    pub landmarks: LandmarkIndices,
    #[serde(default)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub temporal: TemporalConfig,
    #[serde(default)]
    pub weights: Weights,
    #[serde(default)]
    pub decision: DecisionConfig,
}

impl AttentionConfig {
    pub fn validate(&self) -> Result<(), String> {
        let t = &self.thresholds;

        if !(t.ear_concentrated > t.ear_low && t.ear_low > t.ear_severe && t.ear_severe > 0.0) {
            return Err("thresholds.ear must satisfy concentrated > low > severe > 0".to_string());
        }
        if !(0.0..=1.0).contains(&t.perclos_concentrated)
            || !(0.0..=1.0).contains(&t.perclos_severe)
            || t.perclos_concentrated > t.perclos_severe
        {
            return Err("thresholds.perclos must be in [0,1] with concentrated <= severe".to_string());
        }
        if !(0.0 <= t.blink_concentrated_min
            && t.blink_concentrated_min <= t.blink_concentrated_max
            && t.blink_concentrated_max <= t.blink_severe)
        {
            return Err("thresholds.blink must satisfy 0 <= min <= max <= severe".to_string());
        }
        if t.yaw_concentrated <= 0.0 || t.yaw_concentrated > t.yaw_severe {
            return Err("thresholds.yaw must satisfy 0 < concentrated <= severe".to_string());
        }
        if t.pitch_concentrated <= 0.0 || t.pitch_concentrated > t.pitch_severe {
            return Err("thresholds.pitch must satisfy 0 < concentrated <= severe".to_string());
        }
        if !(0.0..=1.0).contains(&t.gaze_focus_concentrated)
            || !(0.0..=1.0).contains(&t.gaze_focus_severe)
            || t.gaze_focus_severe > t.gaze_focus_concentrated
        {
            return Err("thresholds.gaze_focus must be in [0,1] with severe <= concentrated".to_string());
        }
        if t.gaze_dispersion_concentrated < 0.0
            || t.gaze_dispersion_concentrated > t.gaze_dispersion_severe
        {
            return Err("thresholds.gaze_dispersion must satisfy 0 <= concentrated <= severe".to_string());
        }
        if t.eye_opening_severe <= 0.0 || t.eye_opening_severe > t.eye_opening_concentrated {
            return Err("thresholds.eye_opening must satisfy 0 < severe <= concentrated".to_string());
        }
        if t.mar_speaking <= 0.0 || t.mar_speaking > t.mar_yawn {
            return Err("thresholds.mar must satisfy 0 < speaking <= yawn".to_string());
        }

        let c = &self.calibration;
        if c.sample_count == 0 {
            return Err("calibration.sample_count must be > 0".to_string());
        }
        if !(c.top_fraction > 0.0 && c.top_fraction <= 1.0) {
            return Err("calibration.top_fraction must be in (0,1]".to_string());
        }
        if c.baseline_floor <= 0.0 {
            return Err("calibration.baseline_floor must be > 0".to_string());
        }
        if !(c.concentrated_pct > c.low_pct && c.low_pct > c.severe_pct && c.severe_pct > 0.0) {
            return Err("calibration percentages must satisfy concentrated > low > severe > 0".to_string());
        }

        let tc = &self.temporal;
        if tc.perclos_window_secs <= 0.0 || tc.blink_window_secs <= 0.0 || tc.gaze_window_secs <= 0.0 {
            return Err("temporal windows must be > 0".to_string());
        }
        if tc.buffer_capacity == 0 || tc.ear_smoothing == 0 || tc.pose_smoothing == 0 {
            return Err("temporal buffer sizes must be > 0".to_string());
        }
        if tc.blink_min_frames == 0 {
            return Err("temporal.blink_min_frames must be > 0".to_string());
        }
        if tc.yawn_min_duration_secs <= 0.0 {
            return Err("temporal.yawn_min_duration_secs must be > 0".to_string());
        }
        if tc.blink_rate_min_elapsed_secs <= 0.0
            || tc.blink_rate_min_elapsed_secs > tc.blink_rate_max_elapsed_secs
        {
            return Err("temporal blink-rate elapsed clamp must satisfy 0 < min <= max".to_string());
        }
        if tc.gaze_dispersion_scale <= 0.0 || tc.gaze_dispersion_ceiling <= 0.0 {
            return Err("temporal gaze dispersion scale and ceiling must be > 0".to_string());
        }

        if self
            .weights
            .as_array()
            .iter()
            .any(|w| !(0.0..=1.0).contains(w))
        {
            return Err("weights must each be in [0,1]".to_string());
        }

        let d = &self.decision;
        if !(0.0..=100.0).contains(&d.looking_away_score_cap) {
            return Err("decision.looking_away_score_cap must be in [0,100]".to_string());
        }
        if d.not_concentrated_score > d.low_attention_score {
            return Err("decision.not_concentrated_score must be <= low_attention_score".to_string());
        }

        Ok(())
    }
}
