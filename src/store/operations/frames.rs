use attention_core::{AttentionCategory, FrameOutcome};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// Flattened per-frame row, the unit consumed by batch analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub frame_number: u64,
    #[serde(default)]
    pub timestamp: f64,
    pub elapsed_seconds: f64,
    pub attention_score: f64,
    pub attention_level: AttentionCategory,
    #[serde(default)]
    pub ear: f64,
    #[serde(default)]
    pub perclos: f64,
    #[serde(default)]
    pub blinks_per_minute: f64,
    #[serde(default)]
    pub head_yaw: f64,
    #[serde(default)]
    pub head_pitch: f64,
    #[serde(default)]
    pub gaze_focus: f64,
    #[serde(default)]
    pub gaze_dispersion: f64,
    #[serde(default)]
    pub mar: f64,
    #[serde(default)]
    pub is_blink: bool,
    #[serde(default)]
    pub is_yawn: bool,
}

impl FrameRecord {
    pub fn from_outcome(frame_number: u64, elapsed_seconds: f64, outcome: &FrameOutcome) -> Self {
        let s = &outcome.snapshot;
        Self {
            frame_number,
            timestamp: s.timestamp,
            elapsed_seconds,
            attention_score: outcome.result.score,
            attention_level: outcome.result.category,
            ear: s.ear,
            perclos: s.perclos,
            blinks_per_minute: s.blink_rate,
            head_yaw: s.yaw,
            head_pitch: s.pitch,
            gaze_focus: s.gaze_focus,
            gaze_dispersion: s.gaze_dispersion,
            mar: s.mar,
            is_blink: s.is_blink,
            is_yawn: s.is_yawn,
        }
    }
}

impl Store {
    /// A resent frame number overwrites the earlier row.
    pub fn insert_frame(&self, session_id: &str, record: &FrameRecord) -> Result<(), StoreError> {
        let key = keys::frame_key(session_id, record.frame_number);
        self.frames.insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// All stored frames of a session in frame-number order.
    pub fn get_session_frames(&self, session_id: &str) -> Result<Vec<FrameRecord>, StoreError> {
        let prefix = keys::frame_prefix(session_id);
        let mut frames = Vec::new();
        for item in self.frames.scan_prefix(prefix.as_bytes()) {
            let (_, raw) = item?;
            frames.push(Self::deserialize(&raw)?);
        }
        Ok(frames)
    }

    pub fn count_session_frames(&self, session_id: &str) -> Result<usize, StoreError> {
        let prefix = keys::frame_prefix(session_id);
        let mut count = 0;
        for item in self.frames.scan_prefix(prefix.as_bytes()) {
            item?;
            count += 1;
        }
        Ok(count)
    }
}
