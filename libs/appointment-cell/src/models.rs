// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};

// ==============================================================================
// CANONICAL STATUS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalStatus {
    AwaitingPayment,
    PaymentProcessing,
    AwaitingMatch,
    MatchPendingAcceptance,
    AwaitingScheduling,
    Confirmed,
    Rescheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 10] = [
        CanonicalStatus::AwaitingPayment,
        CanonicalStatus::PaymentProcessing,
        CanonicalStatus::AwaitingMatch,
        CanonicalStatus::MatchPendingAcceptance,
        CanonicalStatus::AwaitingScheduling,
        CanonicalStatus::Confirmed,
        CanonicalStatus::Rescheduled,
        CanonicalStatus::Completed,
        CanonicalStatus::Cancelled,
        CanonicalStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::AwaitingPayment => "awaiting_payment",
            CanonicalStatus::PaymentProcessing => "payment_processing",
            CanonicalStatus::AwaitingMatch => "awaiting_match",
            CanonicalStatus::MatchPendingAcceptance => "match_pending_acceptance",
            CanonicalStatus::AwaitingScheduling => "awaiting_scheduling",
            CanonicalStatus::Confirmed => "confirmed",
            CanonicalStatus::Rescheduled => "rescheduled",
            CanonicalStatus::Completed => "completed",
            CanonicalStatus::Cancelled => "cancelled",
            CanonicalStatus::NoShow => "no_show",
        }
    }

    /// Exact match against the current vocabulary only; legacy tokens go through the mapper.
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|status| status.as_str() == token)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CanonicalStatus::Completed | CanonicalStatus::Cancelled | CanonicalStatus::NoShow)
    }

    /// Statuses that imply an operator has been bound to the appointment.
    pub fn requires_resource(&self) -> bool {
        matches!(
            self,
            CanonicalStatus::AwaitingScheduling
                | CanonicalStatus::Confirmed
                | CanonicalStatus::Rescheduled
                | CanonicalStatus::Completed
        )
    }

    pub fn requires_date(&self) -> bool {
        matches!(
            self,
            CanonicalStatus::Confirmed | CanonicalStatus::Rescheduled | CanonicalStatus::Completed
        )
    }

    /// Statuses only reachable once payment has cleared.
    pub fn is_past_payment_gate(&self) -> bool {
        !matches!(
            self,
            CanonicalStatus::AwaitingPayment | CanonicalStatus::PaymentProcessing | CanonicalStatus::Cancelled
        )
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the resolver: a canonical member, or an unmapped token passed
/// through for generic display. Unknown tokens are never transition-eligible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedStatus {
    Known(CanonicalStatus),
    Unknown(String),
}

impl ResolvedStatus {
    pub fn canonical(&self) -> Option<CanonicalStatus> {
        match self {
            ResolvedStatus::Known(status) => Some(*status),
            ResolvedStatus::Unknown(_) => None,
        }
    }

    pub fn is(&self, status: CanonicalStatus) -> bool {
        self.canonical() == Some(status)
    }

    pub fn is_terminal(&self) -> bool {
        self.canonical().map(|s| s.is_terminal()).unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        match self {
            ResolvedStatus::Known(status) => status.as_str(),
            ResolvedStatus::Unknown(token) => token,
        }
    }
}

impl fmt::Display for ResolvedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==============================================================================
// APPOINTMENT SNAPSHOT
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSignals {
    pub provider_verified: bool,
    pub provider_status: Option<String>,
    pub balance_paid: bool,
    pub payment_reference: Option<String>,
}

/// Result returned by the payment provider for one payment reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub verified: bool,
    pub provider_status: String,
}

/// The narrow view of an appointment record the lifecycle engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentSnapshot {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub raw_status: String,
    /// Set only by administrators; wins over every other signal.
    #[serde(default)]
    pub admin_override: Option<CanonicalStatus>,
    #[serde(default)]
    pub payment: PaymentSignals,
    #[serde(default)]
    pub assigned_operator_id: Option<Uuid>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub accepted: bool,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub rescheduled: bool,
    #[serde(default)]
    pub operator_validated: bool,
    #[serde(default)]
    pub operator_paid_out: bool,
    #[serde(default)]
    pub has_meeting_link: bool,
    #[serde(default)]
    pub history: Vec<TransitionRecord>,
    /// Bumped on every committed transition or override; the store's conditional write compares it.
    #[serde(default)]
    pub version: u64,
}

impl AppointmentSnapshot {
    /// A freshly created appointment: awaiting payment, no operator.
    pub fn new(id: Uuid, requester_id: Uuid) -> Self {
        Self {
            id,
            requester_id,
            raw_status: CanonicalStatus::AwaitingPayment.as_str().to_string(),
            admin_override: None,
            payment: PaymentSignals::default(),
            assigned_operator_id: None,
            scheduled_at: None,
            accepted: false,
            confirmed: false,
            rescheduled: false,
            operator_validated: false,
            operator_paid_out: false,
            has_meeting_link: false,
            history: Vec::new(),
            version: 0,
        }
    }

    /// Folds a fresh provider result into the stored payment signals.
    pub fn with_verification(mut self, verification: &PaymentVerification) -> Self {
        self.payment.provider_verified = verification.verified;
        self.payment.provider_status = Some(verification.provider_status.clone());
        self
    }

    /// Applies a committed transition to the record fields.
    ///
    /// Overrides only set `admin_override`; regular transitions write the raw
    /// status, update the matching progress flag and clear any override.
    /// Payment signals verified while committing are persisted either way.
    pub fn apply_transition(&mut self, record: TransitionRecord) {
        if let Some(payment) = &record.payment {
            self.payment = payment.clone();
        }
        if record.is_override {
            self.admin_override = Some(record.to_status);
        } else {
            self.admin_override = None;
            self.raw_status = record.to_status.as_str().to_string();
            match record.to_status {
                CanonicalStatus::AwaitingScheduling => self.accepted = true,
                CanonicalStatus::Confirmed => {
                    self.confirmed = true;
                    self.rescheduled = false;
                }
                CanonicalStatus::Rescheduled => self.rescheduled = true,
                CanonicalStatus::Completed => self.operator_validated = true,
                _ => {}
            }
        }
        self.version += 1;
        self.history.push(record);
    }
}

/// One entry of the append-only transition history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from_status: String,
    pub to_status: CanonicalStatus,
    pub actor: Actor,
    pub reason: Option<String>,
    pub committed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_override: bool,
    /// Provider-verified payment signals observed for this commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentSignals>,
}

// ==============================================================================
// RESOLUTION
// ==============================================================================

/// Data-integrity anomalies found while resolving. These never block resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityWarning {
    MissingResource { status: CanonicalStatus },
    MissingDate { status: CanonicalStatus },
    UnknownStatusToken { token: String },
    UnvalidatedCompletion,
    /// Raw status claims progress past payment while the payment gate is closed.
    PaymentReversed { raw_status: String },
}

impl IntegrityWarning {
    pub fn code(&self) -> &'static str {
        match self {
            IntegrityWarning::MissingResource { .. } => "MISSING_RESOURCE",
            IntegrityWarning::MissingDate { .. } => "MISSING_DATE",
            IntegrityWarning::UnknownStatusToken { .. } => "UNKNOWN_STATUS_TOKEN",
            IntegrityWarning::UnvalidatedCompletion => "UNVALIDATED_COMPLETION",
            IntegrityWarning::PaymentReversed { .. } => "PAYMENT_REVERSED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResolution {
    pub status: ResolvedStatus,
    pub warnings: Vec<IntegrityWarning>,
    /// The deprecated token that was translated, when the legacy table was used.
    pub legacy_token: Option<String>,
}

// ==============================================================================
// VALIDATION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationCategory {
    Graph,
    Structural,
    Authorization,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Violation {
    InvalidTransition { from: ResolvedStatus, to: CanonicalStatus },
    MissingResource,
    MissingDate,
    PaymentNotComplete,
    TerminalImmutable { status: CanonicalStatus },
    NotOwner,
    RequesterForbidden { target: CanonicalStatus },
    NotAssignedOperator,
    OperatorForbiddenCancelled,
}

impl Violation {
    pub fn code(&self) -> &'static str {
        match self {
            Violation::InvalidTransition { .. } => "INVALID_TRANSITION",
            Violation::MissingResource => "MISSING_RESOURCE",
            Violation::MissingDate => "MISSING_DATE",
            Violation::PaymentNotComplete => "PAYMENT_NOT_COMPLETE",
            Violation::TerminalImmutable { .. } => "TERMINAL_IMMUTABLE",
            Violation::NotOwner => "NOT_OWNER",
            Violation::RequesterForbidden { .. } => "REQUESTER_FORBIDDEN",
            Violation::NotAssignedOperator => "NOT_ASSIGNED_OPERATOR",
            Violation::OperatorForbiddenCancelled => "OPERATOR_FORBIDDEN_CANCELLED",
        }
    }

    pub fn category(&self) -> ViolationCategory {
        match self {
            Violation::InvalidTransition { .. } => ViolationCategory::Graph,
            Violation::MissingResource
            | Violation::MissingDate
            | Violation::PaymentNotComplete
            | Violation::TerminalImmutable { .. } => ViolationCategory::Structural,
            Violation::NotOwner
            | Violation::RequesterForbidden { .. }
            | Violation::NotAssignedOperator
            | Violation::OperatorForbiddenCancelled => ViolationCategory::Authorization,
        }
    }

    /// Administrators get the technical detail, everyone else a plain sentence.
    pub fn message_for(&self, role: ActorRole) -> String {
        if role == ActorRole::Administrator {
            return match self {
                Violation::InvalidTransition { from, to } => {
                    format!("INVALID_TRANSITION: {} -> {} is not an edge of the transition graph", from, to)
                }
                Violation::MissingResource => "MISSING_RESOURCE: target status requires an assigned operator".to_string(),
                Violation::MissingDate => "MISSING_DATE: target status requires a scheduled timestamp".to_string(),
                Violation::PaymentNotComplete => {
                    "PAYMENT_NOT_COMPLETE: neither provider verification nor balance payment is present".to_string()
                }
                Violation::TerminalImmutable { status } => {
                    format!("TERMINAL_IMMUTABLE: {} is terminal and only administrators may act on it", status)
                }
                Violation::NotOwner => "NOT_OWNER: requester does not own this appointment".to_string(),
                Violation::RequesterForbidden { target } => {
                    format!("REQUESTER_FORBIDDEN: requesters may not move this appointment to {}", target)
                }
                Violation::NotAssignedOperator => {
                    "NOT_ASSIGNED_OPERATOR: operator is not assigned to this appointment".to_string()
                }
                Violation::OperatorForbiddenCancelled => {
                    "OPERATOR_FORBIDDEN_CANCELLED: operators may not act on cancelled appointments".to_string()
                }
            };
        }

        match self.category() {
            ViolationCategory::Graph => "This change is not possible at the appointment's current stage.".to_string(),
            ViolationCategory::Structural => match self {
                Violation::PaymentNotComplete => "Payment for this appointment has not been completed yet.".to_string(),
                Violation::TerminalImmutable { .. } => "This appointment is closed and can no longer be changed.".to_string(),
                _ => "Some appointment details are still missing for this change.".to_string(),
            },
            ViolationCategory::Authorization => "You are not allowed to make this change.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub current_status: ResolvedStatus,
    pub target: CanonicalStatus,
    pub violations: Vec<Violation>,
    pub warnings: Vec<IntegrityWarning>,
}

impl ValidationResult {
    pub fn violation_codes(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.code().to_string()).collect()
    }

    pub fn has_violation(&self, code: &str) -> bool {
        self.violations.iter().any(|v| v.code() == code)
    }

    /// Deduplicated user-facing messages for the given role.
    pub fn messages_for(&self, role: ActorRole) -> Vec<String> {
        let mut messages: Vec<String> = Vec::new();
        for violation in &self.violations {
            let message = violation.message_for(role);
            if !messages.contains(&message) {
                messages.push(message);
            }
        }
        messages
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveStatusRequest {
    pub snapshot: AppointmentSnapshot,
    pub verification: Option<PaymentVerification>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedTransitionsResponse {
    pub status: CanonicalStatus,
    pub allowed: Vec<CanonicalStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateTransitionRequest {
    pub snapshot: AppointmentSnapshot,
    pub target: CanonicalStatus,
}

/// Role-shaped validation feedback: full detail for administrators only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub ok: bool,
    pub current_status: ResolvedStatus,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<IntegrityWarning>>,
}

impl ValidationResponse {
    pub fn for_role(result: ValidationResult, role: ActorRole) -> Self {
        let messages = result.messages_for(role);
        let detailed = role == ActorRole::Administrator;
        Self {
            ok: result.ok,
            current_status: result.current_status,
            messages,
            violations: detailed.then_some(result.violations),
            warnings: detailed.then_some(result.warnings),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub target: CanonicalStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionReceipt {
    pub appointment_id: Uuid,
    pub from_status: ResolvedStatus,
    pub status: ResolvedStatus,
    pub committed_at: DateTime<Utc>,
    pub warnings: Vec<IntegrityWarning>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment {appointment_id} changed since it was read (read in raw status {expected_status})")]
    StaleState { appointment_id: Uuid, expected_status: String },

    #[error("Transition rejected: {}", .0.violation_codes().join(", "))]
    Rejected(Box<ValidationResult>),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    #[error("Invalid filter parameters: {0}")]
    InvalidFilterParams(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Store error: {0}")]
    Store(String),
}
