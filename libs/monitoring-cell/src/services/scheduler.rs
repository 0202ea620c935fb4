// =====================================================================================
// MONITORING SCHEDULER
// =====================================================================================

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::models::Alert;
use crate::services::{AlertManagerService, AlertNotifier, MetricsCollectorService};
use shared_config::AppConfig;

/// Periodic compaction and alert evaluation over explicitly injected services.
pub struct MonitoringScheduler {
    metrics: Arc<MetricsCollectorService>,
    alerts: Arc<AlertManagerService>,
    notifier: Arc<dyn AlertNotifier>,
    evaluation_interval: Duration,
    compaction_interval: Duration,
}

/// Running scheduler task. Dropping the handle leaves the task running; call
/// [`SchedulerHandle::shutdown`] to stop it.
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Monitoring scheduler task ended abnormally: {}", e);
        }
    }
}

impl MonitoringScheduler {
    pub fn new(
        config: &AppConfig,
        metrics: Arc<MetricsCollectorService>,
        alerts: Arc<AlertManagerService>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            metrics,
            alerts,
            notifier,
            evaluation_interval: Duration::from_secs(config.alert_evaluation_interval_seconds.max(1)),
            compaction_interval: Duration::from_secs(config.metrics_compaction_interval_seconds.max(1)),
        }
    }

    /// One evaluation pass: snapshot, check rules, hand fired alerts to the notifier.
    ///
    /// Notification failures are logged and never propagated.
    #[instrument(skip(self))]
    pub async fn evaluate_once(&self) -> Vec<Alert> {
        let snapshot = self.metrics.get_metrics_snapshot().await;
        let fired = self.alerts.check_alert_rules(&snapshot).await;
        self.dispatch(&fired).await;
        fired
    }

    pub async fn dispatch(&self, fired: &[Alert]) {
        for alert in fired {
            if let Err(e) = self.notifier.notify(alert).await {
                warn!(alert_id = %alert.alert_id, "Alert notification failed: {}", e);
            }
        }
    }

    pub async fn compact_once(&self) -> usize {
        self.metrics.compact().await
    }

    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut evaluation = tokio::time::interval(self.evaluation_interval);
            let mut compaction = tokio::time::interval(self.compaction_interval);
            info!(
                evaluation_secs = self.evaluation_interval.as_secs(),
                compaction_secs = self.compaction_interval.as_secs(),
                "Monitoring scheduler started"
            );

            loop {
                tokio::select! {
                    _ = evaluation.tick() => {
                        let fired = self.evaluate_once().await;
                        debug!(fired = fired.len(), "Alert evaluation cycle finished");
                    }
                    _ = compaction.tick() => {
                        self.compact_once().await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Monitoring scheduler stopped");
        });

        SchedulerHandle { shutdown_tx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MonitoringError;
    use crate::services::notifier::MockAlertNotifier;

    fn services() -> (Arc<MetricsCollectorService>, Arc<AlertManagerService>) {
        let config = AppConfig::default();
        let observing_since = chrono::Utc::now() - chrono::Duration::days(2);
        (
            Arc::new(MetricsCollectorService::with_windows(24, 72, observing_since)),
            Arc::new(AlertManagerService::new(&config)),
        )
    }

    #[tokio::test]
    async fn test_evaluate_once_notifies_fired_alerts() {
        let (metrics, alerts) = services();
        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify()
            .withf(|alert| alert.rule_name == crate::services::alerts::NO_RECENT_TRANSITIONS)
            .times(1)
            .returning(|_| Ok(()));

        let scheduler = MonitoringScheduler::new(&AppConfig::default(), metrics, alerts.clone(), Arc::new(notifier));
        let fired = scheduler.evaluate_once().await;
        assert_eq!(fired.len(), 1);

        // Inside the cooldown nothing new fires, so nothing is sent.
        assert!(scheduler.evaluate_once().await.is_empty());
        assert_eq!(alerts.get_active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_notification_failure_is_isolated() {
        let (metrics, alerts) = services();
        let mut notifier = MockAlertNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Err(MonitoringError::NotificationFailed("smtp down".to_string())));

        let scheduler = MonitoringScheduler::new(&AppConfig::default(), metrics, alerts.clone(), Arc::new(notifier));
        let fired = scheduler.evaluate_once().await;
        assert_eq!(fired.len(), 1);
        assert_eq!(alerts.get_active_alerts().await.len(), 1);
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let (metrics, alerts) = services();
        let scheduler = Arc::new(MonitoringScheduler::new(
            &AppConfig::default(),
            metrics,
            alerts.clone(),
            Arc::new(crate::services::LoggingNotifier),
        ));

        let handle = scheduler.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown().await;

        // The first interval tick fires immediately.
        assert_eq!(alerts.get_all_alerts().await.len(), 1);
    }
}
