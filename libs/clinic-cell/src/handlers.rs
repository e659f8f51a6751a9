use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::ClinicError;
use crate::services::ClinicDirectoryService;
use crate::settings::{
    BookingRestrictionSettings, BookingRestrictionSettingsPatch, NotificationSettingsPatch,
};

impl From<ClinicError> for AppError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::ClinicNotFound | ClinicError::AssociationNotFound => {
                AppError::NotFound(e.to_string())
            }
            ClinicError::ValidationError(msg) => AppError::ValidationError(msg),
            ClinicError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn get_booking_restrictions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicDirectoryService::new(&config);

    let clinic = service.get_clinic(clinic_id, Some(auth.token())).await?;
    let settings = BookingRestrictionSettings::from_value(&clinic.booking_restriction_settings);

    Ok(Json(json!(settings)))
}

#[axum::debug_handler]
pub async fn update_booking_restrictions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
    Json(patch): Json<BookingRestrictionSettingsPatch>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicDirectoryService::new(&config);

    let merged = service
        .update_booking_restriction_settings(clinic_id, &patch, Some(auth.token()))
        .await?;

    Ok(Json(json!(merged)))
}

#[axum::debug_handler]
pub async fn list_associations(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicDirectoryService::new(&config);

    let associations = service
        .list_active_associations(clinic_id, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "associations": associations,
        "total": associations.len()
    })))
}

#[axum::debug_handler]
pub async fn update_notification_settings(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(association_id): Path<Uuid>,
    Json(patch): Json<NotificationSettingsPatch>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicDirectoryService::new(&config);

    let merged = service
        .update_notification_settings(association_id, &patch, Some(auth.token()))
        .await?;

    Ok(Json(json!(merged)))
}
