// =====================================================================================
// MONITORING CELL INTEGRATION TESTS
// =====================================================================================

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio_test::assert_ok;
use tower::ServiceExt;
use uuid::Uuid;

use monitoring_cell::{
    create_monitoring_router, AlertManagerService, LoggingNotifier, MetricsCollectorService,
    MonitoringError, MonitoringHandlers, MonitoringScheduler, TransitionOutcome, TransitionTimer,
};
use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_utils::jwt::issue_token;

const SECRET: &str = "monitoring-test-secret";

struct TestMonitoring {
    config: Arc<AppConfig>,
    metrics: Arc<MetricsCollectorService>,
    alerts: Arc<AlertManagerService>,
    handlers: Arc<MonitoringHandlers>,
}

impl TestMonitoring {
    fn router(&self) -> Router {
        create_monitoring_router(self.handlers.clone(), self.config.clone())
    }
}

fn request(method: &str, uri: &str, actor: &Actor) -> Request<Body> {
    let token = issue_token(actor, SECRET, Duration::hours(1)).unwrap();
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn admin() -> Actor {
    Actor::administrator(Uuid::new_v4())
}

fn setup(observing_for: Duration) -> TestMonitoring {
    let config = AppConfig { jwt_secret: SECRET.to_string(), ..AppConfig::default() };
    let metrics = Arc::new(MetricsCollectorService::with_windows(
        config.metrics_window_hours,
        config.metrics_retention_hours,
        Utc::now() - observing_for,
    ));
    let alerts = Arc::new(AlertManagerService::new(&config));
    let scheduler = Arc::new(MonitoringScheduler::new(
        &config,
        metrics.clone(),
        alerts.clone(),
        Arc::new(LoggingNotifier),
    ));
    let handlers = Arc::new(MonitoringHandlers::new(metrics.clone(), alerts.clone(), scheduler));

    TestMonitoring { config: Arc::new(config), metrics, alerts, handlers }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_metrics_endpoint_reports_recorded_transitions() {
    let monitoring = setup(Duration::hours(1));

    for _ in 0..3 {
        let timer = TransitionTimer::start(Uuid::new_v4(), "confirmed", "completed");
        assert_ok!(
            monitoring
                .metrics
                .record_transition_outcome(timer, TransitionOutcome::Committed)
                .await
        );
    }
    let timer = TransitionTimer::start(Uuid::new_v4(), "completed", "confirmed");
    monitoring
        .metrics
        .record_transition_outcome(
            timer,
            TransitionOutcome::Rejected { categories: vec!["INVALID_TRANSITION".to_string()] },
        )
        .await
        .unwrap();

    let response = monitoring
        .router()
        .oneshot(request("GET", "/metrics", &Actor::operator(Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let metrics = &json["metrics"];
    assert_eq!(metrics["total_transitions"], 4);
    assert_eq!(metrics["successful_transitions"], 3);
    assert_eq!(metrics["errors_by_category"]["INVALID_TRANSITION"], 1);
    assert!(metrics.get("p95_latency_ms").is_some());
    assert!(json["active_alerts"].is_array());
}

#[tokio::test]
async fn test_evaluate_and_resolve_alert_flow() {
    let monitoring = setup(Duration::hours(30));

    let response = monitoring.router().oneshot(request("POST", "/alerts/evaluate", &admin())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let fired = json["fired"].as_array().unwrap();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0]["rule_name"], "No Recent Transitions");
    assert_eq!(json["active_count"], 1);

    // A second evaluation inside the cooldown fires nothing new.
    let json = body_json(monitoring.router().oneshot(request("POST", "/alerts/evaluate", &admin())).await.unwrap()).await;
    assert_eq!(json["fired"].as_array().unwrap().len(), 0);

    let alert_id = fired[0]["alert_id"].as_str().unwrap().to_string();
    let response = monitoring
        .router()
        .oneshot(request("POST", &format!("/alerts/{}/resolve", alert_id), &admin()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_json(response).await["resolved_at"].is_string());

    assert!(monitoring.alerts.get_active_alerts().await.is_empty());
}

#[tokio::test]
async fn test_resolve_unknown_alert_is_not_found() {
    let monitoring = setup(Duration::hours(1));

    let response = monitoring
        .router()
        .oneshot(request("POST", "/alerts/does-not-exist/resolve", &admin()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_matches!(
        monitoring.alerts.resolve_alert("does-not-exist").await,
        Err(MonitoringError::AlertNotFound(_))
    );
}

#[tokio::test]
async fn test_alert_summary_counts_active_by_severity() {
    let monitoring = setup(Duration::hours(30));
    let snapshot = monitoring.metrics.get_metrics_snapshot().await;
    monitoring.alerts.check_alert_rules(&snapshot).await;

    let response = monitoring
        .router()
        .oneshot(request("GET", "/alerts/summary", &Actor::requester(Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["critical"], 1);
}

#[tokio::test]
async fn test_alert_actions_require_administrator_token() {
    let monitoring = setup(Duration::hours(30));

    let anonymous = Request::builder().method("POST").uri("/alerts/evaluate").body(Body::empty()).unwrap();
    let response = monitoring.router().oneshot(anonymous).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let operator = Actor::operator(Uuid::new_v4());
    let response = monitoring.router().oneshot(request("POST", "/alerts/evaluate", &operator)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(monitoring.alerts.get_all_alerts().await.is_empty());

    let snapshot = monitoring.metrics.get_metrics_snapshot().await;
    let fired = monitoring.alerts.check_alert_rules(&snapshot).await;
    let uri = format!("/alerts/{}/resolve", fired[0].alert_id);
    let response = monitoring
        .router()
        .oneshot(request("POST", &uri, &Actor::requester(Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(monitoring.alerts.get_active_alerts().await.len(), 1);
}
