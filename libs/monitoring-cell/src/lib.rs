// =====================================================================================
// MONITORING CELL - APPOINTMENT TRANSITION OBSERVABILITY
// =====================================================================================
//
// - Per-transition timing handles and outcome recording
// - Rolling-window latency, throughput and error aggregation with compaction
// - Alert rules with cooldowns and an append-only alert log
// - Periodic evaluation scheduler with an explicit start/shutdown lifecycle
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    Alert, AlertCondition, AlertRule, AlertSeverity, MetricsSnapshot, MonitoringError,
    TransitionOutcome, TransitionTimer,
};

pub use services::{
    AlertManagerService, AlertNotifier, LoggingNotifier, MetricsCollectorService,
    MonitoringScheduler, SchedulerHandle,
};

pub use handlers::MonitoringHandlers;
pub use router::create_monitoring_router;
