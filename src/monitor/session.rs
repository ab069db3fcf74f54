use std::collections::BTreeMap;
use std::time::Instant;

use attention_core::{
    AttentionCategory, AttentionTracker, ClassificationDetail, FrameOutcome, Metric, Point3,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::analysis::SessionReport;
use crate::store::operations::sessions::{SessionRecord, SessionStatus};

/// One decoded frame request.
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub frame_number: u64,
    pub timestamp: f64,
    pub width: f64,
    pub height: f64,
    /// `None` when the detector found no face.
    pub landmarks: Option<Vec<Point3>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessFrameResponse {
    pub frame_number: u64,
    pub face_detected: bool,
    pub attention_level: Option<AttentionCategory>,
    pub attention_score: Option<f64>,
    pub is_concentrated: Option<bool>,
    pub ear: Option<f64>,
    pub perclos: Option<f64>,
    pub blinks_per_minute: Option<f64>,
    pub head_yaw: Option<f64>,
    pub head_pitch: Option<f64>,
    pub gaze_focus: Option<f64>,
    pub gaze_dispersion: Option<f64>,
    pub mar: Option<f64>,
    pub is_blink: Option<bool>,
    pub is_yawn: Option<bool>,
    pub calibrated: Option<bool>,
    pub details: Option<BTreeMap<Metric, ClassificationDetail>>,
}

impl ProcessFrameResponse {
    pub fn no_face(frame_number: u64) -> Self {
        Self {
            frame_number,
            face_detected: false,
            attention_level: None,
            attention_score: None,
            is_concentrated: None,
            ear: None,
            perclos: None,
            blinks_per_minute: None,
            head_yaw: None,
            head_pitch: None,
            gaze_focus: None,
            gaze_dispersion: None,
            mar: None,
            is_blink: None,
            is_yawn: None,
            calibrated: None,
            details: None,
        }
    }

    pub fn from_outcome(frame_number: u64, outcome: FrameOutcome) -> Self {
        let s = outcome.snapshot;
        let r = outcome.result;
        Self {
            frame_number,
            face_detected: true,
            attention_level: Some(r.category),
            attention_score: Some(r.score),
            is_concentrated: Some(r.is_concentrated),
            ear: Some(s.ear),
            perclos: Some(s.perclos),
            blinks_per_minute: Some(s.blink_rate),
            head_yaw: Some(s.yaw),
            head_pitch: Some(s.pitch),
            gaze_focus: Some(s.gaze_focus),
            gaze_dispersion: Some(s.gaze_dispersion),
            mar: Some(s.mar),
            is_blink: Some(s.is_blink),
            is_yawn: Some(s.is_yawn),
            calibrated: Some(s.calibrated),
            details: Some(r.details),
        }
    }
}

/// Pushed to live subscribers of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    Frame(ProcessFrameResponse),
    #[serde(rename_all = "camelCase")]
    Closed { session_id: String, report: Option<SessionReport> },
    #[serde(rename_all = "camelCase")]
    Evicted { session_id: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::Frame(_) => "frame",
            SessionEvent::Closed { .. } => "closed",
            SessionEvent::Evicted { .. } => "evicted",
        }
    }
}

/// Live state of one subject. Guarded by the registry's per-session mutex.
pub struct SubjectSession {
    pub(crate) id: String,
    pub(crate) tracker: AttentionTracker,
    pub(crate) first_timestamp: Option<f64>,
    pub(crate) last_timestamp: Option<f64>,
    pub(crate) frames: u64,
    pub(crate) last_activity: Instant,
    pub(crate) events: broadcast::Sender<SessionEvent>,
    /// Set once the session left the registry; frames that were waiting on the lock
    /// must not reach the tracker.
    pub(crate) retired: Option<SessionStatus>,
}

impl SubjectSession {
    pub fn new(id: &str, tracker: AttentionTracker, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            id: id.to_string(),
            tracker,
            first_timestamp: None,
            last_timestamp: None,
            frames: 0,
            last_activity: Instant::now(),
            events,
            retired: None,
        }
    }

    /// Continues the counters and time base of a stored session.
    pub(crate) fn resume(&mut self, record: &SessionRecord) {
        self.frames = record.frames_processed;
        self.first_timestamp = record.first_timestamp;
        self.last_timestamp = record.last_timestamp;
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn tracker(&self) -> &AttentionTracker {
        &self.tracker
    }

    /// Equal timestamps are accepted.
    pub fn is_out_of_order(&self, timestamp: f64) -> bool {
        matches!(self.last_timestamp, Some(last) if timestamp < last)
    }

    /// Seconds since the first accepted frame.
    pub(crate) fn accept_timestamp(&mut self, timestamp: f64) -> f64 {
        let first = *self.first_timestamp.get_or_insert(timestamp);
        self.last_timestamp = Some(timestamp);
        self.frames += 1;
        self.touch();
        (timestamp - first).max(0.0)
    }

    pub(crate) fn publish(&self, event: SessionEvent) {
        // no subscribers is the common case
        let _ = self.events.send(event);
    }
}
