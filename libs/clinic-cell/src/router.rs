use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_clinic_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(
            "/{id}/booking-restrictions",
            get(get_booking_restrictions).patch(update_booking_restrictions),
        )
        .route("/{id}/associations", get(list_associations))
        .route(
            "/associations/{id}/notification-settings",
            patch(update_notification_settings),
        )
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
