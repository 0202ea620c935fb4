// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, AppointmentHandlers};

/// Every route requires a bearer token; handlers read the caller from `Extension<Actor>`.
pub fn appointment_routes(state: Arc<AppointmentHandlers>, config: Arc<AppConfig>) -> Router {
    // Pure computations over caller-supplied snapshots
    let evaluation_routes = Router::new()
        .route("/status/resolve", post(handlers::resolve_status))
        .route("/transitions/{status}", get(handlers::get_allowed_transitions))
        .route("/transitions/validate", post(handlers::validate_transition))
        .route("/filter", post(handlers::filter_appointments));

    // Commits against the appointment store
    let commit_routes = Router::new()
        .route("/{appointment_id}/transition", post(handlers::transition_appointment))
        .route("/{appointment_id}/override", post(handlers::override_status));

    Router::new()
        .merge(evaluation_routes)
        .merge(commit_routes)
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
