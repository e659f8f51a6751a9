use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use shared_utils::time::taipei_to_utc;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    CanceledByPatient,
    CanceledByClinic,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::CanceledByPatient => write!(f, "canceled_by_patient"),
            AppointmentStatus::CanceledByClinic => write!(f, "canceled_by_clinic"),
        }
    }
}

/// A booked clinic visit. Appointments are never hard-deleted; cancellation
/// is a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub patient_id: Uuid,
    pub appointment_type_id: Uuid,
    pub calendar_event_id: Uuid,
    pub status: AppointmentStatus,
    /// True while the practitioner was assigned by the system and the
    /// booking is still hidden from that practitioner's view. One-way:
    /// flips to false exactly once, never back.
    pub is_auto_assigned: bool,
    pub pending_time_confirmation: bool,
    /// Historical flag, set at booking time and never cleared.
    pub originally_auto_assigned: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Time-slot record backing an appointment. `date`/`start_time`/`end_time`
/// are timezone-naive, clinic-local values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub practitioner_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
    pub line_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentTypeSummary {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: Option<i32>,
}

/// An appointment joined to its calendar event (and, where the selector
/// requests it, the patient and appointment type), the shape returned by
/// the PostgREST embedded queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithEvent {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub calendar_event: CalendarEvent,
    #[serde(default)]
    pub patient: Option<PatientSummary>,
    #[serde(default)]
    pub appointment_type: Option<AppointmentTypeSummary>,
}

impl AppointmentWithEvent {
    pub fn start_time_utc(&self) -> DateTime<Utc> {
        taipei_to_utc(self.calendar_event.date, self.calendar_event.start_time)
    }

    pub fn patient_name(&self) -> &str {
        self.patient.as_ref().map(|p| p.name.as_str()).unwrap_or("病患")
    }

    pub fn type_name(&self) -> &str {
        self.appointment_type
            .as_ref()
            .map(|t| t.name.as_str())
            .unwrap_or("治療")
    }

    pub fn duration_minutes(&self) -> Option<i32> {
        self.appointment_type.as_ref().and_then(|t| t.duration_minutes)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VisibilityRunSummary {
    pub clinics_processed: usize,
    pub revealed: usize,
    pub not_yet_due: usize,
    pub errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Calendar event has no practitioner assigned")]
    PractitionerNotAssigned,

    #[error("Assigned practitioner is no longer active in the clinic")]
    PractitionerInactive,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
