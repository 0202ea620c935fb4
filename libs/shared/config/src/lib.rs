use std::env;
use std::str::FromStr;
use tracing::warn;

/// How a balance (pre-funded credit) payment is treated by the payment gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancePaymentPolicy {
    /// Balance payments satisfy the gate without provider verification.
    Trusted,
    /// Balance payments still need a successful provider verification.
    RequireVerification,
}

impl BalancePaymentPolicy {
    pub fn trusts_balance(&self) -> bool {
        *self == BalancePaymentPolicy::Trusted
    }
}

impl FromStr for BalancePaymentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trusted" => Ok(BalancePaymentPolicy::Trusted),
            "require_verification" => Ok(BalancePaymentPolicy::RequireVerification),
            other => Err(format!("unknown balance payment policy: {}", other)),
        }
    }
}

/// Longest aggregation window, retention span or silence threshold accepted, in hours.
pub const MAX_WINDOW_HOURS: i64 = 8_760;
/// Longest alert cooldown accepted, in minutes.
pub const MAX_COOLDOWN_MINUTES: i64 = MAX_WINDOW_HOURS * 60;
/// Longest scheduler interval accepted, in seconds.
pub const MAX_INTERVAL_SECONDS: u64 = 86_400;

#[derive(Clone)]
pub struct AppConfig {
    /// HS256 secret for bearer tokens. Empty rejects every token.
    pub jwt_secret: String,
    pub balance_payment_policy: BalancePaymentPolicy,
    pub metrics_window_hours: i64,
    pub metrics_retention_hours: i64,
    pub metrics_compaction_interval_seconds: u64,
    pub alert_evaluation_interval_seconds: u64,
    pub alert_cooldown_minutes: i64,
    pub no_transition_alert_hours: i64,
    pub error_rate_alert_percentage: f64,
    pub error_rate_min_samples: u64,
    pub api_port: u16,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("jwt_secret", &"[redacted]")
            .field("balance_payment_policy", &self.balance_payment_policy)
            .field("metrics_window_hours", &self.metrics_window_hours)
            .field("metrics_retention_hours", &self.metrics_retention_hours)
            .field("metrics_compaction_interval_seconds", &self.metrics_compaction_interval_seconds)
            .field("alert_evaluation_interval_seconds", &self.alert_evaluation_interval_seconds)
            .field("alert_cooldown_minutes", &self.alert_cooldown_minutes)
            .field("no_transition_alert_hours", &self.no_transition_alert_hours)
            .field("error_rate_alert_percentage", &self.error_rate_alert_percentage)
            .field("error_rate_min_samples", &self.error_rate_min_samples)
            .field("api_port", &self.api_port)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            balance_payment_policy: BalancePaymentPolicy::Trusted,
            metrics_window_hours: 24,
            metrics_retention_hours: 72,
            metrics_compaction_interval_seconds: 300,
            alert_evaluation_interval_seconds: 60,
            alert_cooldown_minutes: 60,
            no_transition_alert_hours: 24,
            error_rate_alert_percentage: 10.0,
            error_rate_min_samples: 20,
            api_port: 3000,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not set; every authenticated request will be rejected");
            String::new()
        });

        let config = Self {
            jwt_secret,
            balance_payment_policy: env_or("BALANCE_PAYMENT_POLICY", defaults.balance_payment_policy),
            metrics_window_hours: env_or("METRICS_WINDOW_HOURS", defaults.metrics_window_hours),
            metrics_retention_hours: env_or("METRICS_RETENTION_HOURS", defaults.metrics_retention_hours),
            metrics_compaction_interval_seconds: env_or(
                "METRICS_COMPACTION_INTERVAL_SECONDS",
                defaults.metrics_compaction_interval_seconds,
            ),
            alert_evaluation_interval_seconds: env_or(
                "ALERT_EVALUATION_INTERVAL_SECONDS",
                defaults.alert_evaluation_interval_seconds,
            ),
            alert_cooldown_minutes: env_or("ALERT_COOLDOWN_MINUTES", defaults.alert_cooldown_minutes),
            no_transition_alert_hours: env_or("NO_TRANSITION_ALERT_HOURS", defaults.no_transition_alert_hours),
            error_rate_alert_percentage: env_or(
                "ERROR_RATE_ALERT_PERCENTAGE",
                defaults.error_rate_alert_percentage,
            ),
            error_rate_min_samples: env_or("ERROR_RATE_MIN_SAMPLES", defaults.error_rate_min_samples),
            api_port: env_or("API_PORT", defaults.api_port),
        }
        .bounded();

        if !config.is_consistent() {
            warn!("METRICS_RETENTION_HOURS is shorter than METRICS_WINDOW_HOURS; retention is widened to the window");
        }

        config
    }

    /// Clamps every duration-like setting into the range the services can
    /// turn into timers and windows without overflowing.
    pub fn bounded(self) -> Self {
        Self {
            metrics_window_hours: bounded("METRICS_WINDOW_HOURS", self.metrics_window_hours, 1, MAX_WINDOW_HOURS),
            metrics_retention_hours: bounded(
                "METRICS_RETENTION_HOURS",
                self.metrics_retention_hours,
                1,
                MAX_WINDOW_HOURS,
            ),
            metrics_compaction_interval_seconds: bounded(
                "METRICS_COMPACTION_INTERVAL_SECONDS",
                self.metrics_compaction_interval_seconds,
                1,
                MAX_INTERVAL_SECONDS,
            ),
            alert_evaluation_interval_seconds: bounded(
                "ALERT_EVALUATION_INTERVAL_SECONDS",
                self.alert_evaluation_interval_seconds,
                1,
                MAX_INTERVAL_SECONDS,
            ),
            alert_cooldown_minutes: bounded(
                "ALERT_COOLDOWN_MINUTES",
                self.alert_cooldown_minutes,
                0,
                MAX_COOLDOWN_MINUTES,
            ),
            no_transition_alert_hours: bounded(
                "NO_TRANSITION_ALERT_HOURS",
                self.no_transition_alert_hours,
                1,
                MAX_WINDOW_HOURS,
            ),
            error_rate_alert_percentage: bounded(
                "ERROR_RATE_ALERT_PERCENTAGE",
                self.error_rate_alert_percentage,
                0.0,
                100.0,
            ),
            ..self
        }
    }

    /// Retention must cover at least one full aggregation window.
    pub fn is_consistent(&self) -> bool {
        self.metrics_retention_hours >= self.metrics_window_hours
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!("{} has unparseable value {:?}, using default {:?}", key, raw, default);
                default
            }
        },
        Err(_) => {
            warn!("{} not set, using default {:?}", key, default);
            default
        }
    }
}

fn bounded<T>(key: &str, value: T, min: T, max: T) -> T
where
    T: PartialOrd + Copy + std::fmt::Debug,
{
    use std::cmp::Ordering;

    match (value.partial_cmp(&min), value.partial_cmp(&max)) {
        (Some(Ordering::Less), _) => {
            warn!("{} value {:?} is below {:?}, clamping", key, value, min);
            min
        }
        (_, Some(Ordering::Greater)) => {
            warn!("{} value {:?} is above {:?}, clamping", key, value, max);
            max
        }
        (Some(_), Some(_)) => value,
        _ => {
            warn!("{} value {:?} is not a number, using {:?}", key, value, min);
            min
        }
    }
}
