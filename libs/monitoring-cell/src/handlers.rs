// =====================================================================================
// MONITORING CELL HANDLERS
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use tracing::{info, instrument};

use crate::models::{Alert, AlertEvaluationResponse, MetricsResponse, MonitoringError};
use crate::services::{AlertManagerService, MetricsCollectorService, MonitoringScheduler};

pub struct MonitoringHandlers {
    metrics_service: Arc<MetricsCollectorService>,
    alert_service: Arc<AlertManagerService>,
    scheduler: Arc<MonitoringScheduler>,
}

impl MonitoringHandlers {
    pub fn new(
        metrics_service: Arc<MetricsCollectorService>,
        alert_service: Arc<AlertManagerService>,
        scheduler: Arc<MonitoringScheduler>,
    ) -> Self {
        Self {
            metrics_service,
            alert_service,
            scheduler,
        }
    }
}

// =====================================================================================
// METRICS ENDPOINTS
// =====================================================================================

#[instrument(skip(handlers))]
pub async fn get_current_metrics(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<MetricsResponse>, MonitoringError> {
    let metrics = handlers.metrics_service.get_metrics_snapshot().await;
    let active_alerts = handlers.alert_service.get_active_alerts().await;

    Ok(Json(MetricsResponse { metrics, active_alerts }))
}

// =====================================================================================
// ALERT ENDPOINTS
// =====================================================================================

#[instrument(skip(handlers))]
pub async fn get_active_alerts(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<Vec<Alert>>, MonitoringError> {
    Ok(Json(handlers.alert_service.get_active_alerts().await))
}

#[instrument(skip(handlers))]
pub async fn get_alert_summary(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<HashMap<String, u32>>, MonitoringError> {
    Ok(Json(handlers.alert_service.get_alert_summary().await))
}

#[instrument(skip(handlers))]
pub async fn evaluate_alerts(
    State(handlers): State<Arc<MonitoringHandlers>>,
) -> Result<Json<AlertEvaluationResponse>, MonitoringError> {
    let fired = handlers.scheduler.evaluate_once().await;
    let active_count = handlers.alert_service.get_active_alerts().await.len();

    Ok(Json(AlertEvaluationResponse { fired, active_count }))
}

#[instrument(skip(handlers))]
pub async fn resolve_alert(
    State(handlers): State<Arc<MonitoringHandlers>>,
    Path(alert_id): Path<String>,
) -> Result<Json<Alert>, MonitoringError> {
    let alert = handlers.alert_service.resolve_alert(&alert_id).await?;
    info!("Alert {} resolved via API", alert_id);
    Ok(Json(alert))
}

// =====================================================================================
// ERROR RESPONSE IMPLEMENTATION
// =====================================================================================

impl IntoResponse for MonitoringError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            MonitoringError::MetricsError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Metrics collection error"),
            MonitoringError::InvalidTiming { .. } => (StatusCode::BAD_REQUEST, "Invalid transition timing"),
            MonitoringError::AlertNotFound(_) => (StatusCode::NOT_FOUND, "Alert not found"),
            MonitoringError::NotificationFailed(_) => (StatusCode::BAD_GATEWAY, "Alert notification failed"),
        };

        (status, Json(serde_json::json!({
            "error": message,
            "timestamp": chrono::Utc::now()
        }))).into_response()
    }
}
