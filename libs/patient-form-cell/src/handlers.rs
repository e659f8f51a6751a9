use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::PatientFormError;
use crate::services::PatientFormService;

impl From<PatientFormError> for AppError {
    fn from(e: PatientFormError) -> Self {
        match e {
            PatientFormError::ConfigNotFound | PatientFormError::TemplateNotFound => {
                AppError::NotFound(e.to_string())
            }
            PatientFormError::MissingContext(_) => AppError::BadRequest(e.to_string()),
            PatientFormError::DatabaseError(msg) => AppError::Database(msg),
            PatientFormError::Appointment(err) => err.into(),
            PatientFormError::Notification(err) => err.into(),
        }
    }
}

/// Manual trigger for the patient-form queue, mirroring the cron job.
#[axum::debug_handler]
pub async fn run_form_processing(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = PatientFormService::new(&config);

    let summary = service.process_due(Utc::now()).await;

    Ok(Json(json!(summary)))
}

/// Lifecycle hook: an appointment was created or confirmed.
#[axum::debug_handler]
pub async fn schedule_forms(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientFormService::new(&config);

    let outcomes = service
        .schedule_for_appointment(appointment_id, Utc::now())
        .await?;

    Ok(Json(json!({ "outcomes": outcomes })))
}

/// Lifecycle hook: an appointment was canceled.
#[axum::debug_handler]
pub async fn cancel_forms(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientFormService::new(&config);

    service.cancel_forms_for_appointment(appointment_id).await?;

    Ok(Json(json!({ "canceled": true })))
}

/// Lifecycle hook: an appointment's time slot changed.
#[axum::debug_handler]
pub async fn reschedule_forms(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = PatientFormService::new(&config);

    let outcomes = service
        .reschedule_forms_for_appointment(appointment_id, Utc::now())
        .await?;

    Ok(Json(json!({ "outcomes": outcomes })))
}
