use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{AppointmentError, AppointmentWithEvent};

/// Embedded select shared by the appointment selectors: the appointment row
/// plus its calendar event, patient and type.
const EMBED_SELECT: &str = "select=*,calendar_event:calendar_events(*),patient:patients(id,name,line_user_id),appointment_type:appointment_types(id,name,duration_minutes)";

/// Read/write access to appointments, always scoped by clinic. Scheduled
/// jobs call with `auth = None` (service role); handlers forward the
/// caller's bearer token.
pub struct AppointmentQueryService {
    supabase: Arc<SupabaseClient>,
}

impl AppointmentQueryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth: Option<&str>,
    ) -> Result<T, AppointmentError> {
        let result = match auth {
            Some(token) => self.supabase.request(Method::GET, path, Some(token), None).await,
            None => self.supabase.service_request(Method::GET, path, None).await,
        };
        result.map_err(|e| AppointmentError::DatabaseError(e.to_string()))
    }

    /// Confirmed appointments still hidden from their practitioner, joined
    /// to their time slots. Due-ness is evaluated by the caller against the
    /// clinic's booking-restriction policy.
    pub async fn auto_assigned_candidates(
        &self,
        clinic_id: Uuid,
        auth: Option<&str>,
    ) -> Result<Vec<AppointmentWithEvent>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?{}&clinic_id=eq.{}&is_auto_assigned=eq.true&status=eq.confirmed&order=id.asc",
            EMBED_SELECT, clinic_id
        );
        debug!("Fetching auto-assigned candidates for clinic {}", clinic_id);
        self.fetch(&path, auth).await
    }

    /// Confirmed appointments on one clinic-local calendar date, sorted by
    /// start time.
    pub async fn confirmed_on_date(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        auth: Option<&str>,
    ) -> Result<Vec<AppointmentWithEvent>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select=*,calendar_event:calendar_events!inner(*),patient:patients(id,name,line_user_id),appointment_type:appointment_types(id,name,duration_minutes)&clinic_id=eq.{}&status=eq.confirmed&calendar_event.date=eq.{}",
            clinic_id, date
        );
        let mut appointments: Vec<AppointmentWithEvent> = self.fetch(&path, auth).await?;
        appointments.sort_by_key(|a| a.calendar_event.start_time);
        Ok(appointments)
    }

    pub async fn pending_confirmation_count(
        &self,
        clinic_id: Uuid,
        auth: Option<&str>,
    ) -> Result<usize, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?select=id&clinic_id=eq.{}&status=eq.confirmed&pending_time_confirmation=eq.true",
            clinic_id
        );
        let rows: Vec<Value> = self.fetch(&path, auth).await?;
        Ok(rows.len())
    }

    pub async fn get_with_event(
        &self,
        appointment_id: Uuid,
        auth: Option<&str>,
    ) -> Result<AppointmentWithEvent, AppointmentError> {
        let path = format!("/rest/v1/appointments?{}&id=eq.{}", EMBED_SELECT, appointment_id);
        let rows: Vec<AppointmentWithEvent> = self.fetch(&path, auth).await?;
        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Flip `is_auto_assigned` to false. The `is_auto_assigned=eq.true`
    /// filter makes the transition one-way at the database: a row that was
    /// already revealed matches nothing and the call reports `false`.
    pub async fn reveal(&self, appointment_id: Uuid) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&is_auto_assigned=eq.true",
            appointment_id
        );
        let body = json!({
            "is_auto_assigned": false,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Value> = self
            .supabase
            .service_request_with_headers(
                Method::PATCH,
                &path,
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
