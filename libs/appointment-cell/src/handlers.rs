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

use crate::models::AppointmentError;
use crate::services::{AppointmentQueryService, AutoAssignmentVisibilityService};

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::NotFound => AppError::NotFound(e.to_string()),
            AppointmentError::PractitionerNotAssigned | AppointmentError::PractitionerInactive => {
                AppError::Conflict(e.to_string())
            }
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// Manual trigger for the visibility transition, for operators catching up
/// after downtime without waiting for the next hourly tick.
#[axum::debug_handler]
pub async fn run_visibility_transition(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(_auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AutoAssignmentVisibilityService::new(&config);

    let summary = service.run(Utc::now()).await;

    Ok(Json(json!(summary)))
}

#[axum::debug_handler]
pub async fn list_auto_assigned(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentQueryService::new(&config);

    let appointments = service
        .auto_assigned_candidates(clinic_id, Some(auth.token()))
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
