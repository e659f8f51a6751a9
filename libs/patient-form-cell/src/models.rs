use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::AppointmentError;
use notification_cell::NotificationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FormTiming {
    Before,
    After,
}

/// What to do when a `before` form's computed send time has already passed
/// at scheduling time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImpossiblePolicy {
    SendImmediately,
    Skip,
}

/// Per appointment-type configuration of one intake form: when to send it
/// relative to the visit, either as an hour offset from the start time or
/// at a fixed clinic-local time N days before/after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientFormConfig {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_type_id: Uuid,
    pub medical_record_template_id: Uuid,
    pub timing: FormTiming,
    pub hours_offset: Option<i64>,
    pub specific_time: Option<NaiveTime>,
    pub days_offset: Option<i64>,
    pub on_impossible: ImpossiblePolicy,
    pub is_active: bool,
}

/// Created lazily the first time a form notification actually fires, keyed
/// by `(appointment_id, template_id)` so a reprocessed message after a
/// crash reuses the committed row instead of creating a second one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecord {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_id: Uuid,
    pub template_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicalRecordTemplate {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FormScheduleOutcome {
    Scheduled { send_at: DateTime<Utc> },
    SentImmediately,
    Skipped { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Sent,
    Skipped,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FormRunSummary {
    pub processed: usize,
    pub sent: usize,
    pub skipped: usize,
    pub errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientFormError {
    #[error("Form config not found")]
    ConfigNotFound,

    #[error("Medical record template not found")]
    TemplateNotFound,

    #[error("Scheduled message context is missing {0}")]
    MissingContext(&'static str),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}
