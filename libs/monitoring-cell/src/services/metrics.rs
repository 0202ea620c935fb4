// =====================================================================================
// TRANSITION METRICS COLLECTOR
// =====================================================================================

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::models::{
    LegacyTokenSighting, MetricsSnapshot, MonitoringError, TransitionEvent, TransitionOutcome,
    TransitionTimer,
};
use shared_config::{AppConfig, MAX_WINDOW_HOURS};

/// Append-then-compact store of finished transition attempts.
///
/// Writers only append; aggregation happens on read and stale entries are
/// dropped by [`MetricsCollectorService::compact_at`]. Readers may observe a
/// slightly stale view while a write is in flight.
#[derive(Debug)]
pub struct MetricsCollectorService {
    events: Arc<RwLock<VecDeque<TransitionEvent>>>,
    legacy_sightings: Arc<RwLock<VecDeque<LegacyTokenSighting>>>,
    window: Duration,
    retention: Duration,
    observing_since: DateTime<Utc>,
}

impl MetricsCollectorService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_windows(config.metrics_window_hours, config.metrics_retention_hours, Utc::now())
    }

    pub fn with_windows(window_hours: i64, retention_hours: i64, observing_since: DateTime<Utc>) -> Self {
        let window_hours = window_hours.clamp(1, MAX_WINDOW_HOURS);
        let retention_hours = retention_hours.clamp(window_hours, MAX_WINDOW_HOURS);
        Self {
            events: Arc::new(RwLock::new(VecDeque::new())),
            legacy_sightings: Arc::new(RwLock::new(VecDeque::new())),
            window: Duration::hours(window_hours),
            retention: Duration::hours(retention_hours),
            observing_since,
        }
    }

    pub async fn record_transition_outcome(
        &self,
        timer: TransitionTimer,
        outcome: TransitionOutcome,
    ) -> Result<TransitionEvent, MonitoringError> {
        self.record_transition_outcome_at(timer, outcome, Utc::now()).await
    }

    #[instrument(skip(self, timer), fields(transition_id = %timer.transition_id))]
    pub async fn record_transition_outcome_at(
        &self,
        timer: TransitionTimer,
        outcome: TransitionOutcome,
        ended_at: DateTime<Utc>,
    ) -> Result<TransitionEvent, MonitoringError> {
        if ended_at < timer.started_at {
            return Err(MonitoringError::InvalidTiming { transition_id: timer.transition_id });
        }

        let latency = ended_at - timer.started_at;
        let latency_ms = latency
            .num_microseconds()
            .map(|micros| micros as f64 / 1000.0)
            .unwrap_or_else(|| latency.num_milliseconds() as f64);

        let event = TransitionEvent {
            transition_id: timer.transition_id,
            appointment_id: timer.appointment_id,
            from_status: timer.from_status,
            to_status: timer.to_status,
            started_at: timer.started_at,
            ended_at,
            latency_ms,
            outcome,
        };

        debug!(
            appointment_id = %event.appointment_id,
            from = %event.from_status,
            to = %event.to_status,
            latency_ms = event.latency_ms,
            success = event.outcome.is_success(),
            "Recorded transition outcome"
        );

        let mut events = self.events.write().await;
        events.push_back(event.clone());
        Ok(event)
    }

    pub async fn record_legacy_token(&self, token: &str) {
        self.record_legacy_token_at(token, Utc::now()).await
    }

    pub async fn record_legacy_token_at(&self, token: &str, seen_at: DateTime<Utc>) {
        let mut sightings = self.legacy_sightings.write().await;
        sightings.push_back(LegacyTokenSighting { token: token.to_string(), seen_at });
    }

    pub async fn get_metrics_snapshot(&self) -> MetricsSnapshot {
        self.snapshot_at(Utc::now()).await
    }

    pub async fn snapshot_at(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let window_start = now - self.window;

        let in_window: Vec<TransitionEvent> = {
            let events = self.events.read().await;
            events
                .iter()
                .filter(|e| e.ended_at > window_start && e.ended_at <= now)
                .cloned()
                .collect()
        };

        let total_transitions = in_window.len() as u64;
        let successful_transitions = in_window.iter().filter(|e| e.outcome.is_success()).count() as u64;
        let failed_transitions = total_transitions - successful_transitions;

        let error_rate_percentage = if total_transitions > 0 {
            (failed_transitions as f64 / total_transitions as f64) * 100.0
        } else {
            0.0
        };

        let mut errors_by_category = BTreeMap::new();
        for event in &in_window {
            for category in event.outcome.error_categories() {
                *errors_by_category.entry(category).or_insert(0) += 1;
            }
        }

        let mut latencies: Vec<f64> = in_window.iter().map(|e| e.latency_ms).collect();
        latencies.sort_by(|a, b| a.total_cmp(b));

        let transitions_last_minute = in_window
            .iter()
            .filter(|e| e.ended_at > now - Duration::minutes(1))
            .count() as u64;
        let transitions_last_hour = in_window
            .iter()
            .filter(|e| e.ended_at > now - Duration::hours(1))
            .count() as u64;

        let mut hourly: HashMap<i64, u64> = HashMap::new();
        for event in &in_window {
            *hourly.entry(event.ended_at.timestamp().div_euclid(3600)).or_insert(0) += 1;
        }
        let peak_hourly_rate = hourly.values().copied().max().unwrap_or(0);

        let last_transition_at = {
            let events = self.events.read().await;
            events.iter().filter(|e| e.ended_at <= now).map(|e| e.ended_at).max()
        };

        let (legacy_token_sightings, legacy_tokens) = {
            let sightings = self.legacy_sightings.read().await;
            let mut tokens = BTreeMap::new();
            let mut count = 0;
            for sighting in sightings.iter().filter(|s| s.seen_at > window_start && s.seen_at <= now) {
                *tokens.entry(sighting.token.clone()).or_insert(0) += 1;
                count += 1;
            }
            (count, tokens)
        };

        MetricsSnapshot {
            generated_at: now,
            window_hours: self.window.num_hours(),
            observing_since: self.observing_since,
            total_transitions,
            successful_transitions,
            failed_transitions,
            error_rate_percentage,
            p50_latency_ms: percentile(&latencies, 50.0),
            p95_latency_ms: percentile(&latencies, 95.0),
            p99_latency_ms: percentile(&latencies, 99.0),
            transitions_last_minute,
            transitions_last_hour,
            peak_hourly_rate,
            errors_by_category,
            legacy_token_sightings,
            legacy_tokens,
            last_transition_at,
        }
    }

    pub async fn compact(&self) -> usize {
        self.compact_at(Utc::now()).await
    }

    /// Drops everything older than the retention horizon, returning how many entries went.
    #[instrument(skip(self))]
    pub async fn compact_at(&self, now: DateTime<Utc>) -> usize {
        let horizon = now - self.retention;

        let removed_events = {
            let mut events = self.events.write().await;
            let before = events.len();
            events.retain(|e| e.ended_at > horizon);
            before - events.len()
        };

        let removed_sightings = {
            let mut sightings = self.legacy_sightings.write().await;
            let before = sightings.len();
            sightings.retain(|s| s.seen_at > horizon);
            before - sightings.len()
        };

        if removed_events + removed_sightings > 0 {
            debug!(removed_events, removed_sightings, "Compacted metrics store");
        }

        removed_events + removed_sightings
    }

    pub async fn retained_event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

/// Nearest-rank percentile over an ascending slice.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
