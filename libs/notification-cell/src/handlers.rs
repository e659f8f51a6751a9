use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{NotificationError, ScheduledMessageStatus};
use crate::services::ScheduledMessageService;

impl From<NotificationError> for AppError {
    fn from(e: NotificationError) -> Self {
        match e {
            NotificationError::MessageNotFound => AppError::NotFound(e.to_string()),
            NotificationError::NotConfigured(msg) => AppError::ValidationError(msg),
            NotificationError::LineApi(msg) => AppError::ExternalService(msg),
            NotificationError::DatabaseError(msg) => AppError::Database(msg),
            NotificationError::SerializationError(err) => AppError::Internal(err.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduledMessageQuery {
    pub clinic_id: Uuid,
    pub status: Option<ScheduledMessageStatus>,
}

#[axum::debug_handler]
pub async fn list_scheduled_messages(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(query): Query<ScheduledMessageQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ScheduledMessageService::new(&config);

    let messages = service
        .list_for_clinic(query.clinic_id, query.status, auth.token())
        .await?;

    Ok(Json(json!({
        "messages": messages,
        "total": messages.len()
    })))
}
