pub mod alerts;
pub mod metrics;
pub mod notifier;
pub mod scheduler;

pub use alerts::AlertManagerService;
pub use metrics::MetricsCollectorService;
pub use notifier::{AlertNotifier, LoggingNotifier};
pub use scheduler::{MonitoringScheduler, SchedulerHandle};
