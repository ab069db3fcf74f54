use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A landmark in pixel space; `z` is the detector's scaled depth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane.
    pub fn distance_2d(&self, other: &Point3) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// One detector output for one video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    pub points: Vec<Point3>,
    pub width: f64,
    pub height: f64,
    /// Capture time in seconds
    pub timestamp: f64,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Point3>, width: f64, height: f64, timestamp: f64) -> Self {
        Self {
            points,
            width,
            height,
            timestamp,
        }
    }

    pub fn point(&self, index: usize) -> Option<&Point3> {
        self.points.get(index)
    }

    /// Checks the top-level shape of the frame. Missing individual anchors are not an
    /// error here; each extractor degrades on its own.
    pub fn validate(&self) -> Result<(), FrameError> {
        if self.points.is_empty() {
            return Err(FrameError::EmptyLandmarks);
        }
        if !self.timestamp.is_finite() {
            return Err(FrameError::InvalidTimestamp(self.timestamp));
        }
        if !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
        {
            return Err(FrameError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if let Some(index) = self.points.iter().position(|p| !p.is_finite()) {
            return Err(FrameError::NonFiniteLandmark(index));
        }
        Ok(())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("landmark set is empty")]
    EmptyLandmarks,
    #[error("landmark {0} has a non-finite coordinate")]
    NonFiniteLandmark(usize),
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
    #[error("invalid timestamp {0}")]
    InvalidTimestamp(f64),
}

/// Head orientation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Normalised gaze position in [0,1]x[0,1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePoint {
    pub x: f64,
    pub y: f64,
}

impl Default for GazePoint {
    fn default() -> Self {
        Self {
            x: crate::config::NEUTRAL_GAZE,
            y: crate::config::NEUTRAL_GAZE,
        }
    }
}

/// Unsmoothed per-frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFeatures {
    pub ear: f64,
    pub mar: f64,
    pub eye_opening: f64,
    /// `None` when the pose solver failed; the caller reports (0,0,0)
    pub pose: Option<HeadPose>,
    pub gaze: GazePoint,
}

/// Everything derived for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub timestamp: f64,
    pub ear: f64,
    pub ear_raw: f64,
    pub ear_baseline: Option<f64>,
    pub calibrated: bool,
    pub mar: f64,
    pub eye_opening: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub gaze_x: f64,
    pub gaze_y: f64,
    pub perclos: f64,
    pub blink_rate: f64,
    pub gaze_focus: f64,
    pub gaze_dispersion: f64,
    pub is_blink: bool,
    pub is_yawn: bool,
    pub total_blinks: u64,
    pub total_yawns: u64,
    /// Active EAR thresholds (personalised once calibrated)
    pub ear_thresholds: EarThresholds,
    /// True when the frame was unusable and neutral values were substituted
    pub fallback: bool,
}

/// EAR thresholds in effect for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarThresholds {
    pub concentrated: f64,
    pub low: f64,
    pub severe: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubState {
    Concentrated,
    Low,
    Severe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttentionCategory {
    Concentrated,
    LowAttention,
    NotConcentrated,
}

impl AttentionCategory {
    pub const ALL: [AttentionCategory; 3] = [
        AttentionCategory::Concentrated,
        AttentionCategory::LowAttention,
        AttentionCategory::NotConcentrated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttentionCategory::Concentrated => "CONCENTRATED",
            AttentionCategory::LowAttention => "LOW_ATTENTION",
            AttentionCategory::NotConcentrated => "NOT_CONCENTRATED",
        }
    }
}

impl std::fmt::Display for AttentionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The nine classified metrics, in reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Ear,
    Perclos,
    BlinkRate,
    Yaw,
    Pitch,
    GazeFocus,
    GazeDispersion,
    EyeOpening,
    Mar,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Ear,
        Metric::Perclos,
        Metric::BlinkRate,
        Metric::Yaw,
        Metric::Pitch,
        Metric::GazeFocus,
        Metric::GazeDispersion,
        Metric::EyeOpening,
        Metric::Mar,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationDetail {
    pub state: SubState,
    pub score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionResult {
    pub category: AttentionCategory,
    pub is_concentrated: bool,
    pub score: f64,
    pub details: BTreeMap<Metric, ClassificationDetail>,
    pub severe_count: usize,
    pub low_count: usize,
    pub looking_away: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutcome {
    pub snapshot: MetricSnapshot,
    pub result: AttentionResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(points: Vec<Point3>, w: f64, h: f64, ts: f64) -> LandmarkFrame {
        LandmarkFrame::new(points, w, h, ts)
    }

    #[test]
    fn validate_rejects_empty_and_bad_dimensions() {
        assert_eq!(
            frame(vec![], 640.0, 480.0, 0.0).validate(),
            Err(FrameError::EmptyLandmarks)
        );
        assert!(matches!(
            frame(vec![Point3::default()], 0.0, 480.0, 0.0).validate(),
            Err(FrameError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            frame(vec![Point3::default()], 640.0, f64::NAN, 0.0).validate(),
            Err(FrameError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn validate_reports_first_non_finite_point() {
        let points = vec![
            Point3::default(),
            Point3::new(1.0, f64::INFINITY, 0.0),
            Point3::new(f64::NAN, 0.0, 0.0),
        ];
        assert_eq!(
            frame(points, 640.0, 480.0, 1.0).validate(),
            Err(FrameError::NonFiniteLandmark(1))
        );
    }

    #[test]
    fn category_serializes_screaming_snake() {
        let json = serde_json::to_string(&AttentionCategory::LowAttention).expect("serialize");
        assert_eq!(json, "\"LOW_ATTENTION\"");
        assert_eq!(AttentionCategory::NotConcentrated.to_string(), "NOT_CONCENTRATED");
    }

    #[test]
    fn metric_keys_are_camel_case_and_ordered() {
        let mut details = BTreeMap::new();
        details.insert(Metric::Mar, 1);
        details.insert(Metric::Ear, 2);
        details.insert(Metric::GazeFocus, 3);
        let json = serde_json::to_string(&details).expect("serialize");
        assert_eq!(json, r#"{"ear":2,"gazeFocus":3,"mar":1}"#);
    }
}
