use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_appointment_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/visibility/run", post(run_visibility_transition))
        .route("/auto-assigned/{clinic_id}", get(list_auto_assigned))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
