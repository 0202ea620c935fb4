use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, AppointmentHandlers};
use monitoring_cell::{create_monitoring_router, MonitoringHandlers};
use shared_config::AppConfig;

pub fn create_router(
    config: Arc<AppConfig>,
    appointments: Arc<AppointmentHandlers>,
    monitoring: Arc<MonitoringHandlers>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Appointment status API is running!" }))
        .nest("/appointments", appointment_routes(appointments, config.clone()))
        .nest("/monitoring", create_monitoring_router(monitoring, config))
}
