use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::*;

pub fn create_notification_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/scheduled-messages", get(list_scheduled_messages))
        .layer(middleware::from_fn_with_state(config.clone(), auth_middleware))
        .with_state(config)
}
