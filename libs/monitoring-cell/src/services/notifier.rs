// =====================================================================================
// ALERT NOTIFICATION SEAM
// =====================================================================================

use async_trait::async_trait;
use tracing::{info, warn};

use crate::models::{Alert, AlertSeverity, MonitoringError};

/// Egress for fully-formed alerts (chat, email, paging). Delivery is owned by
/// the implementor; the monitoring cell only hands alerts over.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<(), MonitoringError>;
}

/// Default notifier that only writes alerts to the tracing pipeline.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

#[async_trait]
impl AlertNotifier for LoggingNotifier {
    async fn notify(&self, alert: &Alert) -> Result<(), MonitoringError> {
        match alert.severity {
            AlertSeverity::Critical | AlertSeverity::Emergency => warn!(
                alert_id = %alert.alert_id,
                rule = %alert.rule_name,
                "Alert dispatched: {}", alert.description
            ),
            _ => info!(
                alert_id = %alert.alert_id,
                rule = %alert.rule_name,
                "Alert dispatched: {}", alert.description
            ),
        }
        Ok(())
    }
}
