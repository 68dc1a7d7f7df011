//! Working state of the conversation currently on screen.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use engage_core::types::{AppointmentDetails, PatientId, SessionData};

static LAST_SESSION_MILLIS: AtomicU64 = AtomicU64::new(0);

/// Next `session_<epoch-millis>` id. Strictly increasing within the process,
/// so two sessions opened in the same millisecond still get distinct ids.
fn next_session_id(now: DateTime<Utc>) -> String {
    let now_ms = now.timestamp_millis().max(0) as u64;
    let previous = LAST_SESSION_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now_ms.max(last + 1))
        })
        .unwrap_or(now_ms);
    format!("session_{}", now_ms.max(previous + 1))
}

/// Holds at most one open [`SessionData`].
///
/// Appends on a closed store are ignored.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: Option<SessionData>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh session for `patient_id`, replacing any previous one.
    pub fn start(&mut self, patient_id: PatientId) -> &SessionData {
        self.start_at(patient_id, Utc::now())
    }

    pub(crate) fn start_at(&mut self, patient_id: PatientId, now: DateTime<Utc>) -> &SessionData {
        let data = SessionData {
            session_id: next_session_id(now),
            patient_id,
            start_time: now,
            needs_identified: Vec::new(),
            notes: Vec::new(),
            outcome: None,
            appointment_details: None,
        };
        tracing::debug!(session_id = %data.session_id, patient_id, "Session opened");
        self.current.insert(data)
    }

    pub fn append_needs<I>(&mut self, needs: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(data) = self.current.as_mut() {
            data.needs_identified.extend(needs);
        }
    }

    pub fn append_notes<I>(&mut self, notes: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(data) = self.current.as_mut() {
            data.notes.extend(notes);
        }
    }

    /// Set the outcome label. Last write wins.
    pub fn record_outcome(&mut self, label: impl Into<String>) {
        if let Some(data) = self.current.as_mut() {
            data.outcome = Some(label.into());
        }
    }

    pub fn record_appointment(&mut self, details: AppointmentDetails) {
        if let Some(data) = self.current.as_mut() {
            data.appointment_details = Some(details);
        }
    }

    /// Copy of the open session, if any.
    pub fn snapshot(&self) -> Option<SessionData> {
        self.current.clone()
    }

    /// Close the store, handing back whatever was open.
    pub fn clear(&mut self) -> Option<SessionData> {
        self.current.take()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }
}
