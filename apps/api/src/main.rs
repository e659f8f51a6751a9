use std::net::SocketAddr;
use std::sync::Arc;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::services::AutoAssignmentVisibilityService;
use patient_form_cell::services::PatientFormService;
use scheduling_cell::services::{DailyDigestService, PendingReviewService};
use scheduling_cell::{
    DailyDigestJob, JobScheduler, PatientFormJob, PendingReviewJob, VisibilityJob,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Kanghe Clinic API server");

    // Load configuration
    let config = AppConfig::from_env();
    let state = Arc::new(config);

    // Scheduled jobs: one service instance each, constructed at startup and
    // handed to the registry.
    let mut scheduler = JobScheduler::new();
    if state.is_scheduler_configured() {
        scheduler.register(Arc::new(VisibilityJob::new(Arc::new(
            AutoAssignmentVisibilityService::new(&state),
        ))));
        scheduler.register(Arc::new(DailyDigestJob::new(Arc::new(
            DailyDigestService::new(&state),
        ))));
        scheduler.register(Arc::new(PendingReviewJob::new(Arc::new(
            PendingReviewService::new(&state),
        ))));
        scheduler.register(Arc::new(PatientFormJob::new(Arc::new(
            PatientFormService::new(&state),
        ))));
    } else {
        warn!("Service-role credentials missing, scheduled jobs are disabled");
    }
    scheduler.start().await;

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(state.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    // Let in-flight job ticks finish before the process exits.
    scheduler.shutdown().await;
    info!("Shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
