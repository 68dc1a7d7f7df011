//! Shared domain types: patients, chat messages, session working state and
//! completed-session records.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngageError, Result};

/// Outcome recorded when the operator clicks the online scheduling link.
pub const SCHEDULED_ONLINE_OUTCOME: &str = "Clicked 'Schedule Online'";

/// Outcome used for sessions that ended without a conversion.
pub const SESSION_ENDED_OUTCOME: &str = "Session ended";

/// Placeholder for unknown profile and appointment fields.
pub const NOT_AVAILABLE: &str = "N/A";

pub type PatientId = u64;

// =============================================================================
// Patients
// =============================================================================

/// Re-engagement risk tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A simulated patient. Reference data, never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub age: u32,
    pub gender: String,
    pub last_provider: String,
    /// `YYYY-MM-DD`, or empty for a patient who has never visited.
    pub last_visit: String,
    pub preferred_language: String,
    pub risk_level: RiskLevel,
}

impl Patient {
    /// Whether the patient has a previous visit on file.
    pub fn is_returning(&self) -> bool {
        !self.last_visit.trim().is_empty()
    }
}

/// Fields captured by the new-patient form, as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatientForm {
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub age: String,
}

impl NewPatientForm {
    /// Validate the form and build a first-visit patient with the given id.
    pub fn into_patient(self, id: PatientId) -> Result<Patient> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(EngageError::InvalidInput("patient name is required".to_string()));
        }
        let age_text = self.age.trim();
        if age_text.is_empty() {
            return Err(EngageError::InvalidInput("patient age is required".to_string()));
        }
        let age = age_text.parse::<u32>().map_err(|_| {
            EngageError::InvalidInput(format!("patient age must be a whole number, got '{}'", age_text))
        })?;
        let phone = match self.phone.trim() {
            "" => NOT_AVAILABLE.to_string(),
            p => p.to_string(),
        };

        Ok(Patient {
            id,
            name,
            phone,
            address: NOT_AVAILABLE.to_string(),
            age,
            gender: NOT_AVAILABLE.to_string(),
            last_provider: NOT_AVAILABLE.to_string(),
            last_visit: String::new(),
            preferred_language: "English".to_string(),
            risk_level: RiskLevel::Low,
        })
    }
}

// =============================================================================
// Messages
// =============================================================================

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

/// Request state of a chat turn.
///
/// User turns start `Pending` and resolve to `Delivered` or `Failed` once the
/// backend answers. Assistant turns are always `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    Pending,
    Delivered,
    Failed,
}

/// One chat turn. Appended to the conversation log, never edited except for
/// its delivery state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a conversation.
    pub id: u64,
    pub content: String,
    pub sender: Sender,
    /// Local wall-clock time for display, e.g. `09:42 AM`.
    pub timestamp: String,
    pub sent_at: DateTime<Utc>,
    pub delivery: Delivery,
    /// The text carries the online scheduling link.
    #[serde(default)]
    pub offers_scheduling: bool,
}

impl Message {
    /// A user turn awaiting the assistant's reply.
    pub fn user(id: u64, content: impl Into<String>, sent_at: DateTime<Utc>) -> Self {
        Self {
            id,
            content: content.into(),
            sender: Sender::User,
            timestamp: display_time(sent_at),
            sent_at,
            delivery: Delivery::Pending,
            offers_scheduling: false,
        }
    }

    /// An assistant turn. `scheduling_url` marks replies that offer the portal link.
    pub fn ai(
        id: u64,
        content: impl Into<String>,
        sent_at: DateTime<Utc>,
        scheduling_url: &str,
    ) -> Self {
        let content = content.into();
        let offers_scheduling = !scheduling_url.is_empty() && content.contains(scheduling_url);
        Self {
            id,
            content,
            sender: Sender::Ai,
            timestamp: display_time(sent_at),
            sent_at,
            delivery: Delivery::Delivered,
            offers_scheduling,
        }
    }
}

fn display_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%I:%M %p").to_string()
}

// =============================================================================
// Sessions
// =============================================================================

/// Appointment booked during a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub time: String,
    pub provider: String,
    pub location: String,
}

/// Working state of the conversation currently on screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub session_id: String,
    pub patient_id: PatientId,
    pub start_time: DateTime<Utc>,
    pub needs_identified: Vec<String>,
    pub notes: Vec<String>,
    pub outcome: Option<String>,
    pub appointment_details: Option<AppointmentDetails>,
}

/// Whether a completed session ended in an online booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentScheduled {
    Yes,
    No,
}

/// Summary row for one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub date_time: DateTime<Utc>,
    pub chat_length_seconds: u64,
    pub chat_length_formatted: String,
    pub outcome_summary: String,
    pub appointment_scheduled: AppointmentScheduled,
    pub appointment_date_time: String,
    pub appointment_provider: String,
    pub appointment_location: String,
    /// Needs joined with `", "`.
    pub needs_identified: String,
    /// Notes joined with `"; "`.
    pub notes: String,
}

impl ChatRecord {
    /// Fold a finished session into its archive record.
    pub fn from_session(session: &SessionData, patient: &Patient, ended_at: DateTime<Utc>) -> Self {
        let seconds = elapsed_seconds(session.start_time, ended_at);
        let outcome_summary = session
            .outcome
            .clone()
            .unwrap_or_else(|| SESSION_ENDED_OUTCOME.to_string());
        let appointment_scheduled = if outcome_summary == SCHEDULED_ONLINE_OUTCOME {
            AppointmentScheduled::Yes
        } else {
            AppointmentScheduled::No
        };
        let (appointment_date_time, appointment_provider, appointment_location) =
            match &session.appointment_details {
                Some(a) => (a.time.clone(), a.provider.clone(), a.location.clone()),
                None => (
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                    NOT_AVAILABLE.to_string(),
                ),
            };

        Self {
            id: session.session_id.clone(),
            patient_name: patient.name.clone(),
            patient_phone: patient.phone.clone(),
            date_time: ended_at,
            chat_length_seconds: seconds,
            chat_length_formatted: format_duration(seconds),
            outcome_summary,
            appointment_scheduled,
            appointment_date_time,
            appointment_provider,
            appointment_location,
            needs_identified: session.needs_identified.join(", "),
            notes: session.notes.join("; "),
        }
    }

    /// Whether this session converted to an online booking.
    pub fn is_conversion(&self) -> bool {
        self.outcome_summary == SCHEDULED_ONLINE_OUTCOME
    }
}

/// Whole seconds between two instants, rounded half up. Never negative.
pub fn elapsed_seconds(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    let millis = (end - start).num_milliseconds().max(0) as u64;
    (millis + 500) / 1000
}

/// Format seconds as `"<m>m <s>s"`.
pub fn format_duration(seconds: u64) -> String {
    format!("{}m {}s", seconds / 60, seconds % 60)
}
