use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{
    MessageType, NewScheduledLineMessage, NotificationError, ScheduledLineMessage,
    ScheduledMessageStatus,
};

/// Durable outbox over the `scheduled_line_messages` table. All writes are
/// committed through PostgREST before any send attempt, so a crash between
/// commit and send can only lose the notification, never the state.
pub struct ScheduledMessageService {
    supabase: Arc<SupabaseClient>,
}

impl ScheduledMessageService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub async fn schedule(
        &self,
        message: &NewScheduledLineMessage,
    ) -> Result<ScheduledLineMessage, NotificationError> {
        let now = Utc::now();
        let body = json!({
            "clinic_id": message.clinic_id,
            "message_type": message.message_type,
            "message_context": message.message_context,
            "scheduled_send_time": message.scheduled_send_time.to_rfc3339(),
            "status": message.status,
            "error_reason": message.error_reason,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<ScheduledLineMessage> = self
            .supabase
            .service_request_with_headers(
                Method::POST,
                "/rest/v1/scheduled_line_messages",
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;

        rows.into_iter().next().ok_or(NotificationError::MessageNotFound)
    }

    /// Pending messages of one type whose send time has arrived.
    pub async fn due_pending(
        &self,
        now: DateTime<Utc>,
        message_type: MessageType,
    ) -> Result<Vec<ScheduledLineMessage>, NotificationError> {
        let cutoff = urlencoding::encode(&now.to_rfc3339()).into_owned();
        let path = format!(
            "/rest/v1/scheduled_line_messages?status=eq.pending&message_type=eq.{}&scheduled_send_time=lte.{}&order=scheduled_send_time.asc",
            message_type, cutoff
        );
        debug!("Fetching due scheduled messages: {}", path);

        self.supabase
            .service_request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    pub async fn pending_for_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Vec<ScheduledLineMessage>, NotificationError> {
        let path = format!(
            "/rest/v1/scheduled_line_messages?status=eq.pending&message_context->>appointment_id=eq.{}",
            appointment_id
        );
        self.supabase
            .service_request(Method::GET, &path, None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    pub async fn mark_sent(&self, message_id: Uuid) -> Result<(), NotificationError> {
        self.set_status(message_id, ScheduledMessageStatus::Sent, None).await
    }

    pub async fn mark_skipped(
        &self,
        message_id: Uuid,
        reason: &str,
    ) -> Result<(), NotificationError> {
        self.set_status(message_id, ScheduledMessageStatus::Skipped, Some(reason)).await
    }

    /// Mark every still-pending message for an appointment skipped, in one
    /// filtered PATCH. Used on cancellation and time edits.
    pub async fn skip_pending_for_appointment(
        &self,
        appointment_id: Uuid,
        reason: &str,
    ) -> Result<(), NotificationError> {
        let path = format!(
            "/rest/v1/scheduled_line_messages?status=eq.pending&message_context->>appointment_id=eq.{}",
            appointment_id
        );
        let body = json!({
            "status": ScheduledMessageStatus::Skipped,
            "error_reason": reason,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self
            .supabase
            .service_request_with_headers(Method::PATCH, &path, Some(body), Some(return_representation()))
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// Write the produced medical-record ID back into the message context,
    /// the audit trail of which record a queued message ultimately created.
    pub async fn attach_medical_record(
        &self,
        message: &ScheduledLineMessage,
        medical_record_id: Uuid,
    ) -> Result<(), NotificationError> {
        let mut context = message.message_context.clone();
        if let Some(map) = context.as_object_mut() {
            map.insert(
                "medical_record_id".to_string(),
                Value::String(medical_record_id.to_string()),
            );
        }

        let path = format!("/rest/v1/scheduled_line_messages?id=eq.{}", message.id);
        let body = json!({
            "message_context": context,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self
            .supabase
            .service_request_with_headers(Method::PATCH, &path, Some(body), Some(return_representation()))
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    pub async fn list_for_clinic(
        &self,
        clinic_id: Uuid,
        status: Option<ScheduledMessageStatus>,
        auth_token: &str,
    ) -> Result<Vec<ScheduledLineMessage>, NotificationError> {
        let mut path = format!(
            "/rest/v1/scheduled_line_messages?clinic_id=eq.{}&order=scheduled_send_time.desc",
            clinic_id
        );
        if let Some(status) = status {
            path.push_str(&format!("&status=eq.{}", status));
        }

        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))
    }

    async fn set_status(
        &self,
        message_id: Uuid,
        status: ScheduledMessageStatus,
        reason: Option<&str>,
    ) -> Result<(), NotificationError> {
        let path = format!("/rest/v1/scheduled_line_messages?id=eq.{}", message_id);
        let body = json!({
            "status": status,
            "error_reason": reason,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let _: Vec<Value> = self
            .supabase
            .service_request_with_headers(Method::PATCH, &path, Some(body), Some(return_representation()))
            .await
            .map_err(|e| NotificationError::DatabaseError(e.to_string()))?;
        Ok(())
    }
}
