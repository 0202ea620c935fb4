// =====================================================================================
// MONITORING CELL MODELS
// =====================================================================================

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =====================================================================================
// TRANSITION TIMING
// =====================================================================================

/// Timing handle opened when a transition validation starts.
///
/// The handle is consumed when its outcome is recorded, so an attempt can only
/// ever be counted once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionTimer {
    pub transition_id: Uuid,
    pub appointment_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub started_at: DateTime<Utc>,
}

impl TransitionTimer {
    pub fn start(appointment_id: Uuid, from_status: impl Into<String>, to_status: impl Into<String>) -> Self {
        Self::start_at(appointment_id, from_status, to_status, Utc::now())
    }

    pub fn start_at(
        appointment_id: Uuid,
        from_status: impl Into<String>,
        to_status: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            transition_id: Uuid::new_v4(),
            appointment_id,
            from_status: from_status.into(),
            to_status: to_status.into(),
            started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Committed,
    /// Rejected by validation; `categories` holds every violation code reported.
    Rejected { categories: Vec<String> },
    /// The conditional write lost against a concurrent commit.
    StaleState,
    /// A collaborator (store, payment provider) failed.
    Failed { reason: String },
}

impl TransitionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransitionOutcome::Committed)
    }

    /// Error categories this outcome contributes to the error counters.
    pub fn error_categories(&self) -> Vec<String> {
        match self {
            TransitionOutcome::Committed => Vec::new(),
            TransitionOutcome::Rejected { categories } if categories.is_empty() => {
                vec!["REJECTED".to_string()]
            }
            TransitionOutcome::Rejected { categories } => categories.clone(),
            TransitionOutcome::StaleState => vec!["STALE_STATE".to_string()],
            TransitionOutcome::Failed { .. } => vec!["COLLABORATOR_FAILURE".to_string()],
        }
    }
}

/// A finished timing handle as retained by the metrics store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub transition_id: Uuid,
    pub appointment_id: Uuid,
    pub from_status: String,
    pub to_status: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub latency_ms: f64,
    pub outcome: TransitionOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyTokenSighting {
    pub token: String,
    pub seen_at: DateTime<Utc>,
}

// =====================================================================================
// METRICS SNAPSHOT
// =====================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window_hours: i64,
    /// When the collector started observing.
    pub observing_since: DateTime<Utc>,
    pub total_transitions: u64,
    pub successful_transitions: u64,
    pub failed_transitions: u64,
    pub error_rate_percentage: f64,
    pub p50_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub transitions_last_minute: u64,
    pub transitions_last_hour: u64,
    pub peak_hourly_rate: u64,
    pub errors_by_category: BTreeMap<String, u64>,
    pub legacy_token_sightings: u64,
    pub legacy_tokens: BTreeMap<String, u64>,
    pub last_transition_at: Option<DateTime<Utc>>,
}

impl MetricsSnapshot {
    pub fn error_count(&self, category: &str) -> u64 {
        self.errors_by_category.get(category).copied().unwrap_or(0)
    }
}

// =====================================================================================
// ALERTS
// =====================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertSeverity::Info => write!(f, "info"),
            AlertSeverity::Warning => write!(f, "warning"),
            AlertSeverity::Critical => write!(f, "critical"),
            AlertSeverity::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: String,
    pub rule_name: String,
    pub severity: AlertSeverity,
    pub title: String,
    pub description: String,
    pub metric_value: f64,
    pub threshold: f64,
    pub triggered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub tags: HashMap<String, String>,
}

impl Alert {
    pub fn is_active(&self) -> bool {
        self.resolved_at.is_none()
    }
}

/// Named predicate over a metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertCondition {
    /// No transition finished within the last `hours`, once at least that long has been observed.
    NoTransitionsWithin { hours: i64 },
    ErrorRateAbove { percentage: f64, min_samples: u64 },
    /// Any failure in the given error category inside the window.
    CategoryObserved { category: String },
    LegacyTokensObserved { min_sightings: u64 },
    P95LatencyAbove { milliseconds: f64 },
}

/// Evaluation of a condition that currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionMatch {
    pub metric_value: f64,
    pub threshold: f64,
    pub description: String,
}

impl AlertCondition {
    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> Option<ConditionMatch> {
        match self {
            AlertCondition::NoTransitionsWithin { hours } => {
                let horizon = chrono::Duration::hours((*hours).clamp(0, shared_config::MAX_WINDOW_HOURS));
                if snapshot.generated_at - snapshot.observing_since < horizon {
                    return None;
                }
                let idle_hours = match snapshot.last_transition_at {
                    Some(last) if snapshot.generated_at - last < horizon => return None,
                    Some(last) => (snapshot.generated_at - last).num_minutes() as f64 / 60.0,
                    None => (snapshot.generated_at - snapshot.observing_since).num_minutes() as f64 / 60.0,
                };
                Some(ConditionMatch {
                    metric_value: idle_hours,
                    threshold: *hours as f64,
                    description: format!("No appointment transitions recorded in the last {} hours", hours),
                })
            }
            AlertCondition::ErrorRateAbove { percentage, min_samples } => {
                if snapshot.total_transitions < *min_samples || snapshot.error_rate_percentage <= *percentage {
                    return None;
                }
                Some(ConditionMatch {
                    metric_value: snapshot.error_rate_percentage,
                    threshold: *percentage,
                    description: format!(
                        "Transition error rate {:.2}% exceeds {:.2}% over {} attempts",
                        snapshot.error_rate_percentage, percentage, snapshot.total_transitions
                    ),
                })
            }
            AlertCondition::CategoryObserved { category } => {
                let count = snapshot.error_count(category);
                if count == 0 {
                    return None;
                }
                Some(ConditionMatch {
                    metric_value: count as f64,
                    threshold: 0.0,
                    description: format!("{} transition attempts failed with {}", count, category),
                })
            }
            AlertCondition::LegacyTokensObserved { min_sightings } => {
                if snapshot.legacy_token_sightings < *min_sightings {
                    return None;
                }
                let tokens: Vec<&str> = snapshot.legacy_tokens.keys().map(String::as_str).collect();
                Some(ConditionMatch {
                    metric_value: snapshot.legacy_token_sightings as f64,
                    threshold: *min_sightings as f64,
                    description: format!("Legacy status tokens still being resolved: {}", tokens.join(", ")),
                })
            }
            AlertCondition::P95LatencyAbove { milliseconds } => {
                if snapshot.total_transitions == 0 || snapshot.p95_latency_ms <= *milliseconds {
                    return None;
                }
                Some(ConditionMatch {
                    metric_value: snapshot.p95_latency_ms,
                    threshold: *milliseconds,
                    description: format!(
                        "p95 transition latency {:.1}ms exceeds {:.1}ms",
                        snapshot.p95_latency_ms, milliseconds
                    ),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    pub condition: AlertCondition,
    pub severity: AlertSeverity,
    pub cooldown_minutes: i64,
}

// =====================================================================================
// REQUEST/RESPONSE MODELS
// =====================================================================================

#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    pub metrics: MetricsSnapshot,
    pub active_alerts: Vec<Alert>,
}

#[derive(Debug, Serialize)]
pub struct AlertEvaluationResponse {
    pub fired: Vec<Alert>,
    pub active_count: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitoringError {
    #[error("Metrics collection error: {0}")]
    MetricsError(String),
    #[error("Transition {transition_id} ended before it started")]
    InvalidTiming { transition_id: Uuid },
    #[error("Alert not found: {0}")]
    AlertNotFound(String),
    #[error("Alert notification failed: {0}")]
    NotificationFailed(String),
}
