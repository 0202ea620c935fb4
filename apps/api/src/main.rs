use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentHandlers, InMemoryAppointmentStore, StatusResolver, TransitionService, TransitionValidator,
};
use monitoring_cell::{
    AlertManagerService, LoggingNotifier, MetricsCollectorService, MonitoringHandlers, MonitoringScheduler,
};
use shared_config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting appointment status API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());
    info!(policy = ?config.balance_payment_policy, "Balance payment policy");

    // Monitoring services
    let metrics = Arc::new(MetricsCollectorService::new(&config));
    let alerts = Arc::new(AlertManagerService::new(&config));
    let scheduler = Arc::new(MonitoringScheduler::new(
        &config,
        metrics.clone(),
        alerts.clone(),
        Arc::new(LoggingNotifier),
    ));
    let scheduler_handle = scheduler.clone().start();

    // Lifecycle services
    let validator = TransitionValidator::new(StatusResolver::new(&config));
    let store = Arc::new(InMemoryAppointmentStore::new());
    let transitions = Arc::new(TransitionService::new(store, validator, metrics.clone()));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(
        config.clone(),
        Arc::new(AppointmentHandlers::new(transitions)),
        Arc::new(MonitoringHandlers::new(metrics, alerts, scheduler)),
    )
    .layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new()
                .level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new()
                .level(Level::INFO)),
    )
    .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down monitoring scheduler");
    scheduler_handle.shutdown().await;

    Ok(())
}
