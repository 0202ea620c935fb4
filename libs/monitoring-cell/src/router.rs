// =====================================================================================
// MONITORING CELL ROUTER
// =====================================================================================

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use shared_config::AppConfig;
use shared_utils::extractor::{auth_middleware, require_administrator};

use crate::handlers::{
    evaluate_alerts, get_active_alerts, get_alert_summary, get_current_metrics, resolve_alert,
    MonitoringHandlers,
};

pub fn create_monitoring_router(handlers: Arc<MonitoringHandlers>, config: Arc<AppConfig>) -> Router {
    let read_routes = Router::new()
        .route("/metrics", get(get_current_metrics))
        .route("/alerts", get(get_active_alerts))
        .route("/alerts/summary", get(get_alert_summary))
        .with_state(handlers.clone());

    // Operator actions, administrators only
    let admin_routes = Router::new()
        .route("/alerts/evaluate", post(evaluate_alerts))
        .route("/alerts/{alert_id}/resolve", post(resolve_alert))
        .route_layer(middleware::from_fn(require_administrator))
        .with_state(handlers);

    Router::new()
        .merge(read_routes)
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}
