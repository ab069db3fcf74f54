//! Live subject sessions.
//!
//! The registry owns one [`SubjectSession`] per session id. Frames for the same
//! subject are serialised through that session's mutex; different subjects proceed
//! in parallel.

pub mod metrics;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use attention_core::{AttentionConfig, AttentionTracker, CalibrationState, LandmarkFrame};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};

use crate::analysis::{self, AnalysisError};
use crate::config::MonitorConfig;
use crate::store::operations::frames::FrameRecord;
use crate::store::operations::sessions::{SessionRecord, SessionStatus};
use crate::store::{Store, StoreError};
use crate::validation;

pub use metrics::{MetricsSnapshot, ProcessingMetrics};
pub use session::{FrameInput, ProcessFrameResponse, SessionEvent, SubjectSession};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid session id: {0}")]
    InvalidSessionId(&'static str),
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
    #[error("frame timestamp {received} is earlier than the last accepted {last}")]
    OutOfOrder { last: f64, received: f64 },
    #[error("session capacity of {0} reached")]
    Capacity(usize),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session already closed: {0}")]
    Closed(String),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

type SessionHandle = Arc<Mutex<SubjectSession>>;

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    store: Arc<Store>,
    attention: Arc<AttentionConfig>,
    config: MonitorConfig,
    metrics: ProcessingMetrics,
}

impl SessionRegistry {
    pub fn new(store: Arc<Store>, attention: Arc<AttentionConfig>, config: &MonitorConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            attention,
            config: config.clone(),
            metrics: ProcessingMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &ProcessingMetrics {
        &self.metrics
    }

    pub fn attention_config(&self) -> &AttentionConfig {
        &self.attention
    }

    /// Creates the session if needed. Opening a live session is a no-op.
    pub async fn open(&self, session_id: &str) -> Result<SessionRecord, MonitorError> {
        self.handle_or_create(session_id).await?;
        self.store
            .get_session(session_id)?
            .ok_or_else(|| MonitorError::NotFound(session_id.to_string()))
    }

    async fn handle(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(session_id).cloned()
    }

    async fn handle_or_create(&self, session_id: &str) -> Result<SessionHandle, MonitorError> {
        validation::validate_session_id(session_id).map_err(MonitorError::InvalidSessionId)?;

        if let Some(handle) = self.handle(session_id).await {
            return Ok(handle);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(session_id) {
            return Ok(handle.clone());
        }
        if sessions.len() >= self.config.max_sessions {
            return Err(MonitorError::Capacity(self.config.max_sessions));
        }

        let stored = self.store.create_session(&SessionRecord::new(session_id))?;
        match stored.status {
            SessionStatus::Active => {}
            SessionStatus::Completed => return Err(MonitorError::Closed(session_id.to_string())),
            SessionStatus::Evicted => {
                // an evicted subject resumes with a fresh tracker
                self.store.modify_session(session_id, |r| {
                    r.status = SessionStatus::Active;
                    r.calibrated = false;
                    r.ear_baseline = None;
                })?;
                tracing::info!(session_id, "resuming evicted session");
            }
        }

        let tracker = AttentionTracker::new(Arc::clone(&self.attention));
        let mut subject = SubjectSession::new(session_id, tracker, self.config.event_buffer);
        subject.resume(&stored);
        let handle = Arc::new(Mutex::new(subject));
        sessions.insert(session_id.to_string(), handle.clone());
        tracing::info!(session_id, active = sessions.len(), "session opened");
        Ok(handle)
    }

    /// Runs one frame through the subject's tracker, creating the session on first use.
    pub async fn process_frame(
        &self,
        session_id: &str,
        input: FrameInput,
    ) -> Result<ProcessFrameResponse, MonitorError> {
        loop {
            let handle = self.handle_or_create(session_id).await?;
            let mut session = handle.lock().await;
            match session.retired {
                None => return self.observe_locked(&mut session, input),
                // evicted while this frame waited; the next lookup resumes it
                Some(SessionStatus::Evicted) => continue,
                Some(_) => return Err(MonitorError::Closed(session_id.to_string())),
            }
        }
    }

    fn observe_locked(
        &self,
        session: &mut SubjectSession,
        input: FrameInput,
    ) -> Result<ProcessFrameResponse, MonitorError> {
        let id = session.id.clone();
        let session_id = id.as_str();

        let points = match input.landmarks {
            Some(points) if !points.is_empty() => points,
            _ => {
                session.touch();
                self.metrics.record_no_face();
                return Ok(ProcessFrameResponse::no_face(input.frame_number));
            }
        };
        validation::validate_landmark_count(points.len()).map_err(MonitorError::InvalidFrame)?;
        if !input.timestamp.is_finite() {
            return Err(MonitorError::InvalidFrame("timestamp must be finite"));
        }
        if session.is_out_of_order(input.timestamp) {
            self.metrics.record_rejected();
            let last = session.last_timestamp.unwrap_or_default();
            tracing::warn!(session_id, last, received = input.timestamp, "out-of-order frame rejected");
            return Err(MonitorError::OutOfOrder {
                last,
                received: input.timestamp,
            });
        }

        let frame = LandmarkFrame::new(points, input.width, input.height, input.timestamp);
        let started = Instant::now();
        let outcome = session.tracker.observe(&frame);
        self.metrics
            .record_frame(started.elapsed().as_micros() as u64, outcome.snapshot.fallback);

        let elapsed = session.accept_timestamp(input.timestamp);

        if self.config.persist_frames {
            let record = FrameRecord::from_outcome(input.frame_number, elapsed, &outcome);
            self.store.insert_frame(session_id, &record)?;
        }
        let tracker = &session.tracker;
        let (frames, calibrated, baseline, blinks, yawns) = (
            session.frames,
            tracker.is_calibrated(),
            tracker.calibration().baseline,
            tracker.total_blinks(),
            tracker.total_yawns(),
        );
        let (first, last) = (session.first_timestamp, session.last_timestamp);
        self.store.modify_session(session_id, |r| {
            r.frames_processed = frames;
            r.calibrated = calibrated;
            r.ear_baseline = baseline;
            r.total_blinks = blinks;
            r.total_yawns = yawns;
            r.first_timestamp = first;
            r.last_timestamp = last;
        })?;

        let response = ProcessFrameResponse::from_outcome(input.frame_number, outcome);
        session.publish(SessionEvent::Frame(response.clone()));
        Ok(response)
    }

    /// Disposes the tracker, stores the final report and marks the session completed.
    ///
    /// The session stays registered until the store says Completed, so a concurrent
    /// frame either lands before the report or is refused.
    pub async fn close(&self, session_id: &str) -> Result<SessionRecord, MonitorError> {
        let handle = self.handle(session_id).await;
        let mut session = match &handle {
            Some(handle) => Some(handle.lock().await),
            None => None,
        };
        if session.as_ref().is_some_and(|s| s.retired.is_some()) {
            session = None;
        }
        if session.is_none() && self.store.get_session(session_id)?.is_none() {
            return Err(MonitorError::NotFound(session_id.to_string()));
        }

        let report = match self.report(session_id) {
            Ok(report) => Some(report),
            Err(MonitorError::Analysis(AnalysisError::Empty)) => None,
            Err(e) => return Err(e),
        };

        let record = self.store.modify_session(session_id, |r| {
            r.status = SessionStatus::Completed;
            r.report = report.clone();
        })?;

        if let Some(session) = session.as_deref_mut() {
            session.retired = Some(SessionStatus::Completed);
            self.sessions.write().await.remove(session_id);
            session.publish(SessionEvent::Closed {
                session_id: session_id.to_string(),
                report,
            });
        }
        tracing::info!(session_id, frames = record.frames_processed, "session closed");
        Ok(record)
    }

    /// Analysis over the frames stored so far.
    pub fn report(&self, session_id: &str) -> Result<analysis::SessionReport, MonitorError> {
        let frames = self.store.get_session_frames(session_id)?;
        Ok(analysis::analyze_frames(
            &frames,
            self.config.min_distraction_frames,
        )?)
    }

    /// Drops sessions idle for at least `ttl`. Sessions busy with a frame are skipped.
    pub async fn evict_idle(&self, ttl: Duration) -> Result<usize, MonitorError> {
        let mut evicted = Vec::new();
        // the map stays locked until the store agrees, so a resume sees Evicted
        let mut sessions = self.sessions.write().await;
        sessions.retain(|id, handle| match handle.try_lock() {
            Ok(mut session) if session.last_activity.elapsed() >= ttl => {
                session.retired = Some(SessionStatus::Evicted);
                session.publish(SessionEvent::Evicted {
                    session_id: id.clone(),
                });
                evicted.push(id.clone());
                false
            }
            _ => true,
        });

        for id in &evicted {
            match self.store.modify_session(id, |r| r.status = SessionStatus::Evicted) {
                Ok(_) | Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
            tracing::info!(session_id = %id, "idle session evicted");
        }
        drop(sessions);
        Ok(evicted.len())
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<broadcast::Receiver<SessionEvent>, MonitorError> {
        let handle = self
            .handle(session_id)
            .await
            .ok_or_else(|| MonitorError::NotFound(session_id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.events.subscribe())
    }

    /// Calibration progress of a live session.
    pub async fn calibration(&self, session_id: &str) -> Option<CalibrationState> {
        let handle = self.handle(session_id).await?;
        let session = handle.lock().await;
        Some(session.tracker().calibration())
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}
