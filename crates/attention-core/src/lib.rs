//! Attention estimation from facial landmarks
//!
//! Turns a stream of face-mesh frames for one subject into per-frame metrics and an
//! explainable attention classification.
//!
//! ## Modules
//! - `geometry`: EAR, MAR, eye opening and gaze from one frame
//! - `head_pose`: yaw/pitch/roll from a perspective pose solve
//! - `window`: trailing buffers, PERCLOS, blink rate, gaze stability
//! - `blink` / `yawn`: debounced event detectors
//! - `calibration`: one-shot personalised EAR thresholds
//! - `tracker`: per-subject state tying the above together
//! - `classifier`: rule table and decision ladder

pub mod blink;
pub mod calibration;
pub mod classifier;
pub mod config;
pub mod geometry;
pub mod head_pose;
#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;
pub mod tracker;
pub mod types;
pub mod window;
pub mod yawn;

pub use calibration::CalibrationState;
pub use classifier::{classify, decide};
pub use config::AttentionConfig;
pub use tracker::AttentionTracker;
pub use types::{
    AttentionCategory, AttentionResult, ClassificationDetail, FrameError, FrameOutcome,
    LandmarkFrame, Metric, MetricSnapshot, Point3, SubState,
};
