use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::create_appointment_router;
use clinic_cell::create_clinic_router;
use notification_cell::create_notification_router;
use patient_form_cell::create_patient_form_router;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Kanghe Clinic API is running!" }))
        .nest("/clinics", create_clinic_router(state.clone()))
        .nest("/notifications", create_notification_router(state.clone()))
        .nest("/appointments", create_appointment_router(state.clone()))
        .nest("/patient-forms", create_patient_form_router(state.clone()))
}
