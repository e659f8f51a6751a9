use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{return_representation, SupabaseClient};

use crate::models::{Clinic, ClinicError, UserClinicAssociation};
use crate::settings::{
    BookingRestrictionSettings, BookingRestrictionSettingsPatch, NotificationSettings,
    NotificationSettingsPatch,
};

/// Reads and updates the tenant directory: clinics and their staff
/// associations. Scheduled jobs call with `auth = None` (service role);
/// HTTP handlers forward the caller's bearer token.
pub struct ClinicDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl ClinicDirectoryService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        auth: Option<&str>,
    ) -> Result<T, ClinicError> {
        let result = match auth {
            Some(token) => self.supabase.request(Method::GET, path, Some(token), None).await,
            None => self.supabase.service_request(Method::GET, path, None).await,
        };
        result.map_err(|e| ClinicError::DatabaseError(e.to_string()))
    }

    async fn patch(
        &self,
        path: &str,
        body: Value,
        auth: Option<&str>,
    ) -> Result<Vec<Value>, ClinicError> {
        let headers = Some(return_representation());
        let result = match auth {
            Some(token) => {
                self.supabase
                    .request_with_headers(Method::PATCH, path, Some(token), Some(body), headers)
                    .await
            }
            None => {
                self.supabase
                    .service_request_with_headers(Method::PATCH, path, Some(body), headers)
                    .await
            }
        };
        result.map_err(|e| ClinicError::DatabaseError(e.to_string()))
    }

    pub async fn list_active_clinics(&self, auth: Option<&str>) -> Result<Vec<Clinic>, ClinicError> {
        debug!("Listing active clinics");
        self.fetch("/rest/v1/clinics?is_active=eq.true&order=id.asc", auth).await
    }

    pub async fn get_clinic(&self, clinic_id: Uuid, auth: Option<&str>) -> Result<Clinic, ClinicError> {
        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let rows: Vec<Clinic> = self.fetch(&path, auth).await?;
        rows.into_iter().next().ok_or(ClinicError::ClinicNotFound)
    }

    pub async fn list_active_associations(
        &self,
        clinic_id: Uuid,
        auth: Option<&str>,
    ) -> Result<Vec<UserClinicAssociation>, ClinicError> {
        let path = format!(
            "/rest/v1/user_clinic_associations?clinic_id=eq.{}&is_active=eq.true&order=id.asc",
            clinic_id
        );
        self.fetch(&path, auth).await
    }

    pub async fn get_association(
        &self,
        association_id: Uuid,
        auth: Option<&str>,
    ) -> Result<UserClinicAssociation, ClinicError> {
        let path = format!("/rest/v1/user_clinic_associations?id=eq.{}", association_id);
        let rows: Vec<UserClinicAssociation> = self.fetch(&path, auth).await?;
        rows.into_iter().next().ok_or(ClinicError::AssociationNotFound)
    }

    /// The association of one practitioner in one clinic, active or not.
    pub async fn practitioner_association(
        &self,
        clinic_id: Uuid,
        user_id: Uuid,
        auth: Option<&str>,
    ) -> Result<Option<UserClinicAssociation>, ClinicError> {
        let path = format!(
            "/rest/v1/user_clinic_associations?clinic_id=eq.{}&user_id=eq.{}",
            clinic_id, user_id
        );
        let rows: Vec<UserClinicAssociation> = self.fetch(&path, auth).await?;
        Ok(rows.into_iter().next())
    }

    /// Merge a partial booking-restriction update into the stored settings
    /// and persist the merged blob.
    pub async fn update_booking_restriction_settings(
        &self,
        clinic_id: Uuid,
        patch: &BookingRestrictionSettingsPatch,
        auth: Option<&str>,
    ) -> Result<BookingRestrictionSettings, ClinicError> {
        let clinic = self.get_clinic(clinic_id, auth).await?;
        let current = BookingRestrictionSettings::from_value(&clinic.booking_restriction_settings);
        let merged = current.merged_with(patch);

        let merged_value = serde_json::to_value(&merged)
            .map_err(|e| ClinicError::ValidationError(e.to_string()))?;
        let body = json!({
            "booking_restriction_settings": merged_value,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/clinics?id=eq.{}", clinic_id);
        let rows = self.patch(&path, body, auth).await?;
        if rows.is_empty() {
            return Err(ClinicError::ClinicNotFound);
        }

        Ok(merged)
    }

    pub async fn update_notification_settings(
        &self,
        association_id: Uuid,
        patch: &NotificationSettingsPatch,
        auth: Option<&str>,
    ) -> Result<NotificationSettings, ClinicError> {
        let association = self.get_association(association_id, auth).await?;
        let current = NotificationSettings::from_value(&association.notification_settings);
        let merged = current.merged_with(patch);

        let merged_value = serde_json::to_value(&merged)
            .map_err(|e| ClinicError::ValidationError(e.to_string()))?;
        let body = json!({
            "notification_settings": merged_value,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let path = format!("/rest/v1/user_clinic_associations?id=eq.{}", association_id);
        let rows = self.patch(&path, body, auth).await?;
        if rows.is_empty() {
            return Err(ClinicError::AssociationNotFound);
        }

        Ok(merged)
    }
}
