use std::sync::Arc;

use axum::{middleware, routing::post, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_patient_form_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/run", post(run_form_processing))
        .route("/appointments/{id}/schedule", post(schedule_forms))
        .route("/appointments/{id}/cancel", post(cancel_forms))
        .route("/appointments/{id}/reschedule", post(reschedule_forms))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
