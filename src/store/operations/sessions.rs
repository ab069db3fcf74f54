use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::SessionReport;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub frames_processed: u64,
    pub calibrated: bool,
    pub ear_baseline: Option<f64>,
    pub total_blinks: u64,
    pub total_yawns: u64,
    /// Capture times of the first and last accepted frames.
    #[serde(default)]
    pub first_timestamp: Option<f64>,
    #[serde(default)]
    pub last_timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<SessionReport>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Evicted,
}

impl SessionRecord {
    pub fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
            frames_processed: 0,
            calibrated: false,
            ear_baseline: None,
            total_blinks: 0,
            total_yawns: 0,
            first_timestamp: None,
            last_timestamp: None,
            report: None,
        }
    }
}

impl Store {
    /// Inserts the record unless one already exists; returns the stored record either way.
    pub fn create_session(&self, record: &SessionRecord) -> Result<SessionRecord, StoreError> {
        let key = keys::session_key(&record.id);
        let bytes = Self::serialize(record)?;
        match self
            .sessions
            .compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(bytes))?
        {
            Ok(()) => Ok(record.clone()),
            Err(existing) => match existing.current {
                Some(raw) => Self::deserialize(&raw),
                None => Err(StoreError::Conflict {
                    entity: "session".to_string(),
                    key,
                }),
            },
        }
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = keys::session_key(session_id);
        match self.sessions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn update_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let key = keys::session_key(&record.id);
        self.sessions
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// Applies `f` to the stored record and writes it back.
    pub fn modify_session<F>(&self, session_id: &str, f: F) -> Result<SessionRecord, StoreError>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let mut record = self
            .get_session(session_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "session".to_string(),
                key: session_id.to_string(),
            })?;
        f(&mut record);
        record.updated_at = Utc::now();
        self.update_session(&record)?;
        Ok(record)
    }

    pub fn count_sessions_by_status(&self, status: SessionStatus) -> Result<usize, StoreError> {
        let mut count = 0;
        for item in self.sessions.iter() {
            let (_, raw) = item?;
            let record: SessionRecord = Self::deserialize(&raw)?;
            if record.status == status {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::open(dir.path().join("sessions.sled").to_str().expect("path"))
            .expect("open store");
        (dir, store)
    }

    #[test]
    fn create_is_idempotent() {
        let (_dir, store) = temp_store();
        let first = store.create_session(&SessionRecord::new("s1")).expect("create");
        let again = store.create_session(&SessionRecord::new("s1")).expect("create");
        assert_eq!(first.created_at, again.created_at);
        assert_eq!(store.count_sessions_by_status(SessionStatus::Active).expect("count"), 1);
    }

    #[test]
    fn modify_updates_fields_and_timestamp() {
        let (_dir, store) = temp_store();
        let created = store.create_session(&SessionRecord::new("s1")).expect("create");
        let updated = store
            .modify_session("s1", |r| {
                r.frames_processed = 12;
                r.status = SessionStatus::Completed;
            })
            .expect("modify");
        assert_eq!(updated.frames_processed, 12);
        assert!(updated.updated_at >= created.updated_at);
        let loaded = store.get_session("s1").expect("get").expect("present");
        assert_eq!(loaded.status, SessionStatus::Completed);
    }

    #[test]
    fn modify_missing_is_not_found() {
        let (_dir, store) = temp_store();
        let err = store.modify_session("nope", |_| {}).unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(SessionRecord::new("s1")).expect("json");
        assert_eq!(json["status"], "active");
        assert!(json.get("report").is_none());
        assert!(json.get("framesProcessed").is_some());
    }
}
