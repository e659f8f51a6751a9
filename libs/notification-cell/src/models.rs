use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    PatientForm,
    AppointmentReminder,
    PendingReview,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::PatientForm => write!(f, "patient_form"),
            MessageType::AppointmentReminder => write!(f, "appointment_reminder"),
            MessageType::PendingReview => write!(f, "pending_review"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledMessageStatus {
    Pending,
    Sent,
    Skipped,
}

impl fmt::Display for ScheduledMessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduledMessageStatus::Pending => write!(f, "pending"),
            ScheduledMessageStatus::Sent => write!(f, "sent"),
            ScheduledMessageStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Durable queue row for one pending outbound notification. Exactly one
/// send attempt moves `status` off pending; failures are marked skipped
/// with a reason and never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledLineMessage {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub message_type: MessageType,
    /// Correlating IDs, schema varies by `message_type`. For patient forms:
    /// `{appointment_id, patient_form_config_id, medical_record_template_id,
    /// medical_record_id?}` where `medical_record_id` is written back after
    /// the first successful processing as an audit trail.
    #[serde(default)]
    pub message_context: Value,
    pub scheduled_send_time: DateTime<Utc>,
    pub status: ScheduledMessageStatus,
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledLineMessage {
    pub fn context_id(&self, key: &str) -> Option<Uuid> {
        self.message_context
            .get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewScheduledLineMessage {
    pub clinic_id: Uuid,
    pub message_type: MessageType,
    pub message_context: Value,
    pub scheduled_send_time: DateTime<Utc>,
    pub status: ScheduledMessageStatus,
    pub error_reason: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("LINE messaging not configured: {0}")]
    NotConfigured(String),

    #[error("LINE API error: {0}")]
    LineApi(String),

    #[error("Scheduled message not found")]
    MessageNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
