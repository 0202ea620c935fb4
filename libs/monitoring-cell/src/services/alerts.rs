// =====================================================================================
// ALERT MANAGER SERVICE
// =====================================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::models::{
    Alert, AlertCondition, AlertRule, AlertSeverity, ConditionMatch, MetricsSnapshot, MonitoringError,
};
use shared_config::{AppConfig, MAX_COOLDOWN_MINUTES, MAX_WINDOW_HOURS};

pub const NO_RECENT_TRANSITIONS: &str = "No Recent Transitions";
pub const HIGH_ERROR_RATE: &str = "High Transition Error Rate";
pub const INVALID_TRANSITIONS_OBSERVED: &str = "Graph-Invalid Transitions Observed";
pub const STALE_COMMITS_OBSERVED: &str = "Stale Transition Commits Observed";
pub const LEGACY_TOKENS_OBSERVED: &str = "Legacy Status Tokens Still Appearing";
pub const SLOW_TRANSITIONS: &str = "Slow Transition Validation";

pub struct AlertManagerService {
    alert_rules: Arc<RwLock<Vec<AlertRule>>>,
    /// Append-only log; resolving only stamps `resolved_at`.
    alerts: Arc<RwLock<Vec<Alert>>>,
    last_fired: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl AlertManagerService {
    pub fn new(config: &AppConfig) -> Self {
        let cooldown = config.alert_cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES);
        let silence_hours = config.no_transition_alert_hours.clamp(1, MAX_WINDOW_HOURS);

        let alert_rules = vec![
            AlertRule {
                name: NO_RECENT_TRANSITIONS.to_string(),
                condition: AlertCondition::NoTransitionsWithin { hours: silence_hours },
                severity: AlertSeverity::Critical,
                cooldown_minutes: silence_hours * 60,
            },
            AlertRule {
                name: HIGH_ERROR_RATE.to_string(),
                condition: AlertCondition::ErrorRateAbove {
                    percentage: config.error_rate_alert_percentage,
                    min_samples: config.error_rate_min_samples,
                },
                severity: AlertSeverity::Warning,
                cooldown_minutes: cooldown,
            },
            AlertRule {
                name: INVALID_TRANSITIONS_OBSERVED.to_string(),
                condition: AlertCondition::CategoryObserved { category: "INVALID_TRANSITION".to_string() },
                severity: AlertSeverity::Warning,
                cooldown_minutes: cooldown,
            },
            AlertRule {
                name: STALE_COMMITS_OBSERVED.to_string(),
                condition: AlertCondition::CategoryObserved { category: "STALE_STATE".to_string() },
                severity: AlertSeverity::Info,
                cooldown_minutes: cooldown,
            },
            AlertRule {
                name: LEGACY_TOKENS_OBSERVED.to_string(),
                condition: AlertCondition::LegacyTokensObserved { min_sightings: 1 },
                severity: AlertSeverity::Info,
                cooldown_minutes: silence_hours * 60,
            },
            AlertRule {
                name: SLOW_TRANSITIONS.to_string(),
                condition: AlertCondition::P95LatencyAbove { milliseconds: 2000.0 },
                severity: AlertSeverity::Warning,
                cooldown_minutes: cooldown,
            },
        ];

        Self::with_rules(alert_rules)
    }

    pub fn with_rules(alert_rules: Vec<AlertRule>) -> Self {
        Self {
            alert_rules: Arc::new(RwLock::new(alert_rules)),
            alerts: Arc::new(RwLock::new(Vec::new())),
            last_fired: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Evaluates every rule against `metrics` and returns the alerts fired by this call.
    ///
    /// Cooldowns are measured against `metrics.generated_at`. The cooldown table
    /// stays write-locked for the whole pass so two concurrent evaluations cannot
    /// both fire the same rule.
    #[instrument(skip(self, metrics), fields(generated_at = %metrics.generated_at))]
    pub async fn check_alert_rules(&self, metrics: &MetricsSnapshot) -> Vec<Alert> {
        let now = metrics.generated_at;
        let alert_rules = self.alert_rules.read().await;
        let mut last_fired = self.last_fired.write().await;
        let mut fired = Vec::new();

        for rule in alert_rules.iter() {
            let Some(matched) = rule.condition.evaluate(metrics) else {
                continue;
            };

            if let Some(previous) = last_fired.get(&rule.name) {
                let cooldown = Duration::minutes(rule.cooldown_minutes.clamp(0, MAX_COOLDOWN_MINUTES));
                if now - *previous < cooldown {
                    debug!(rule = %rule.name, last_fired = %previous, "Alert suppressed by cooldown");
                    continue;
                }
            }

            let alert = self.build_alert(rule, matched, now);
            self.log_alert(&alert);
            last_fired.insert(rule.name.clone(), now);
            fired.push(alert);
        }
        drop(last_fired);
        drop(alert_rules);

        if !fired.is_empty() {
            let mut alerts = self.alerts.write().await;
            alerts.extend(fired.iter().cloned());
        }

        fired
    }

    fn build_alert(&self, rule: &AlertRule, matched: ConditionMatch, now: DateTime<Utc>) -> Alert {
        Alert {
            alert_id: Uuid::new_v4().to_string(),
            rule_name: rule.name.clone(),
            severity: rule.severity,
            title: rule.name.clone(),
            description: matched.description,
            metric_value: matched.metric_value,
            threshold: matched.threshold,
            triggered_at: now,
            resolved_at: None,
            tags: HashMap::from([
                ("component".to_string(), "appointment_lifecycle".to_string()),
                ("cooldown_minutes".to_string(), rule.cooldown_minutes.to_string()),
            ]),
        }
    }

    fn log_alert(&self, alert: &Alert) {
        match alert.severity {
            AlertSeverity::Critical | AlertSeverity::Emergency => {
                error!(
                    alert_id = %alert.alert_id,
                    severity = %alert.severity,
                    value = %alert.metric_value,
                    threshold = %alert.threshold,
                    "CRITICAL ALERT TRIGGERED: {}", alert.title
                );
            }
            AlertSeverity::Warning => {
                warn!(
                    alert_id = %alert.alert_id,
                    value = %alert.metric_value,
                    "WARNING ALERT: {}", alert.title
                );
            }
            AlertSeverity::Info => {
                info!(alert_id = %alert.alert_id, "INFO ALERT: {}", alert.title);
            }
        }
    }

    pub async fn get_active_alerts(&self) -> Vec<Alert> {
        let alerts = self.alerts.read().await;
        alerts.iter().filter(|a| a.is_active()).cloned().collect()
    }

    pub async fn get_all_alerts(&self) -> Vec<Alert> {
        self.alerts.read().await.clone()
    }

    pub async fn resolve_alert(&self, alert_id: &str) -> Result<Alert, MonitoringError> {
        self.resolve_alert_at(alert_id, Utc::now()).await
    }

    /// Marks an alert resolved. Resolving twice keeps the first timestamp.
    pub async fn resolve_alert_at(&self, alert_id: &str, resolved_at: DateTime<Utc>) -> Result<Alert, MonitoringError> {
        let mut alerts = self.alerts.write().await;
        let alert = alerts
            .iter_mut()
            .find(|a| a.alert_id == alert_id)
            .ok_or_else(|| MonitoringError::AlertNotFound(alert_id.to_string()))?;

        if alert.resolved_at.is_none() {
            alert.resolved_at = Some(resolved_at);
            info!(alert_id = %alert.alert_id, rule = %alert.rule_name, "Alert resolved");
        }

        Ok(alert.clone())
    }

    pub async fn get_alert_summary(&self) -> HashMap<String, u32> {
        let alerts = self.alerts.read().await;
        let mut summary = HashMap::new();

        for alert in alerts.iter().filter(|a| a.is_active()) {
            *summary.entry(alert.severity.to_string()).or_insert(0) += 1;
        }

        summary
    }

    /// Registers a rule on a shared manager; it takes part from the next evaluation.
    pub async fn add_custom_rule(&self, rule: AlertRule) {
        info!(rule = %rule.name, severity = %rule.severity, "Custom alert rule added");
        self.alert_rules.write().await.push(rule);
    }

    pub async fn get_all_rules(&self) -> Vec<AlertRule> {
        self.alert_rules.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn empty_snapshot(generated_at: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            generated_at,
            window_hours: 24,
            observing_since: generated_at - Duration::days(3),
            total_transitions: 0,
            successful_transitions: 0,
            failed_transitions: 0,
            error_rate_percentage: 0.0,
            p50_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            p99_latency_ms: 0.0,
            transitions_last_minute: 0,
            transitions_last_hour: 0,
            peak_hourly_rate: 0,
            errors_by_category: BTreeMap::new(),
            legacy_token_sightings: 0,
            legacy_tokens: BTreeMap::new(),
            last_transition_at: None,
        }
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 4, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_no_recent_transitions_fires_once_per_cooldown() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let now = base_time();

        let first = manager.check_alert_rules(&empty_snapshot(now)).await;
        assert_eq!(first.iter().filter(|a| a.rule_name == NO_RECENT_TRANSITIONS).count(), 1);

        for minutes in [1, 60, 23 * 60] {
            let again = manager.check_alert_rules(&empty_snapshot(now + Duration::minutes(minutes))).await;
            assert!(again.iter().all(|a| a.rule_name != NO_RECENT_TRANSITIONS));
        }

        let after_cooldown = manager.check_alert_rules(&empty_snapshot(now + Duration::hours(24))).await;
        assert_eq!(after_cooldown.iter().filter(|a| a.rule_name == NO_RECENT_TRANSITIONS).count(), 1);
        assert_eq!(manager.get_active_alerts().await.len(), 2);
    }

    #[tokio::test]
    async fn test_no_recent_transitions_waits_for_full_observation_window() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let mut snapshot = empty_snapshot(base_time());
        snapshot.observing_since = base_time() - Duration::hours(2);

        assert!(manager.check_alert_rules(&snapshot).await.is_empty());
    }

    #[tokio::test]
    async fn test_recent_transition_keeps_alert_quiet() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let mut snapshot = empty_snapshot(base_time());
        snapshot.total_transitions = 3;
        snapshot.successful_transitions = 3;
        snapshot.last_transition_at = Some(base_time() - Duration::hours(5));

        assert!(manager.check_alert_rules(&snapshot).await.is_empty());
    }

    #[tokio::test]
    async fn test_error_rate_needs_minimum_samples() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let mut snapshot = empty_snapshot(base_time());
        snapshot.last_transition_at = Some(base_time());
        snapshot.total_transitions = 5;
        snapshot.failed_transitions = 5;
        snapshot.error_rate_percentage = 100.0;
        assert!(manager.check_alert_rules(&snapshot).await.is_empty());

        snapshot.total_transitions = 40;
        snapshot.failed_transitions = 10;
        snapshot.error_rate_percentage = 25.0;
        let fired = manager.check_alert_rules(&snapshot).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].rule_name, HIGH_ERROR_RATE);
        assert_eq!(fired[0].severity, AlertSeverity::Warning);
    }

    #[tokio::test]
    async fn test_invalid_transition_and_legacy_rules() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let mut snapshot = empty_snapshot(base_time());
        snapshot.last_transition_at = Some(base_time());
        snapshot.total_transitions = 1;
        snapshot.failed_transitions = 1;
        snapshot.errors_by_category.insert("INVALID_TRANSITION".to_string(), 1);
        snapshot.legacy_token_sightings = 2;
        snapshot.legacy_tokens.insert("approved".to_string(), 2);

        let fired = manager.check_alert_rules(&snapshot).await;
        let names: Vec<&str> = fired.iter().map(|a| a.rule_name.as_str()).collect();
        assert!(names.contains(&INVALID_TRANSITIONS_OBSERVED));
        assert!(names.contains(&LEGACY_TOKENS_OBSERVED));
        assert!(!names.contains(&HIGH_ERROR_RATE));
    }

    #[tokio::test]
    async fn test_resolve_alert_is_sticky() {
        let manager = AlertManagerService::new(&AppConfig::default());
        let fired = manager.check_alert_rules(&empty_snapshot(base_time())).await;
        let alert_id = fired[0].alert_id.clone();

        let resolved = manager.resolve_alert_at(&alert_id, base_time() + Duration::hours(1)).await.unwrap();
        assert_eq!(resolved.resolved_at, Some(base_time() + Duration::hours(1)));

        let again = manager.resolve_alert_at(&alert_id, base_time() + Duration::hours(2)).await.unwrap();
        assert_eq!(again.resolved_at, Some(base_time() + Duration::hours(1)));

        assert!(manager.get_active_alerts().await.is_empty());
        assert_eq!(manager.get_all_alerts().await.len(), 1);
        assert!(matches!(
            manager.resolve_alert("missing").await,
            Err(MonitoringError::AlertNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_custom_rule() {
        let manager = Arc::new(AlertManagerService::with_rules(Vec::new()));
        let shared = manager.clone();
        shared
            .add_custom_rule(AlertRule {
                name: "Not Owner Spike".to_string(),
                condition: AlertCondition::CategoryObserved { category: "NOT_OWNER".to_string() },
                severity: AlertSeverity::Emergency,
                cooldown_minutes: 10,
            })
            .await;
        assert_eq!(manager.get_all_rules().await.len(), 1);

        let mut snapshot = empty_snapshot(base_time());
        snapshot.errors_by_category.insert("NOT_OWNER".to_string(), 4);
        let fired = manager.check_alert_rules(&snapshot).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].metric_value, 4.0);

        let summary = manager.get_alert_summary().await;
        assert_eq!(summary.get("emergency"), Some(&1));
    }

    #[tokio::test]
    async fn test_custom_rule_with_extreme_values_does_not_overflow() {
        let manager = AlertManagerService::with_rules(Vec::new());
        manager
            .add_custom_rule(AlertRule {
                name: "Silence".to_string(),
                condition: AlertCondition::NoTransitionsWithin { hours: i64::MAX },
                severity: AlertSeverity::Critical,
                cooldown_minutes: i64::MAX,
            })
            .await;
        manager
            .add_custom_rule(AlertRule {
                name: "Stale Spike".to_string(),
                condition: AlertCondition::CategoryObserved { category: "STALE_STATE".to_string() },
                severity: AlertSeverity::Info,
                cooldown_minutes: i64::MAX,
            })
            .await;

        let mut snapshot = empty_snapshot(base_time());
        snapshot.errors_by_category.insert("STALE_STATE".to_string(), 1);
        assert_eq!(manager.check_alert_rules(&snapshot).await.len(), 1);
        assert!(manager.check_alert_rules(&snapshot).await.is_empty());
    }
}
