// libs/appointment-cell/src/services/resolver.rs
use tracing::debug;

use shared_config::{AppConfig, BalancePaymentPolicy};

use crate::models::{
    AppointmentSnapshot, CanonicalStatus, IntegrityWarning, PaymentSignals, PaymentVerification,
    ResolvedStatus, StatusResolution,
};
use crate::services::legacy::{map_status_token, MappedStatus};

/// Derives the single canonical status of an appointment from its raw signals.
///
/// Resolution is pure: no clock reads, no I/O, identical inputs give identical
/// output. Precedence, highest first:
///
/// 1. administrator override
/// 2. payment gate (unpaid means `awaiting_payment`, whatever the raw status says)
/// 3. completion, which needs the operator validation flag
/// 4. reschedule flag on a confirmed appointment
/// 5. legacy-mapped raw status
/// 6. raw status verbatim
#[derive(Debug, Clone, Copy)]
pub struct StatusResolver {
    balance_policy: BalancePaymentPolicy,
}

impl StatusResolver {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_policy(config.balance_payment_policy)
    }

    pub fn with_policy(balance_policy: BalancePaymentPolicy) -> Self {
        Self { balance_policy }
    }

    pub fn payment_gate_satisfied(&self, payment: &PaymentSignals) -> bool {
        payment.provider_verified
            || (payment.balance_paid && self.balance_policy.trusts_balance())
    }

    pub fn resolve_status(
        &self,
        snapshot: &AppointmentSnapshot,
        verification: Option<&PaymentVerification>,
    ) -> ResolvedStatus {
        self.resolve_with_warnings(snapshot, verification).status
    }

    pub fn resolve_with_warnings(
        &self,
        snapshot: &AppointmentSnapshot,
        verification: Option<&PaymentVerification>,
    ) -> StatusResolution {
        let mut warnings = Vec::new();

        let gate_open = match verification {
            Some(v) => {
                v.verified || (snapshot.payment.balance_paid && self.balance_policy.trusts_balance())
            }
            None => self.payment_gate_satisfied(&snapshot.payment),
        };

        let mapped = map_status_token(&snapshot.raw_status);
        let legacy_token = match &mapped {
            MappedStatus::Legacy { token, .. } => Some(token.clone()),
            _ => None,
        };

        let status = if let Some(status) = snapshot.admin_override {
            ResolvedStatus::Known(status)
        } else if !gate_open {
            if mapped.canonical().map(|s| s.is_past_payment_gate()).unwrap_or(false) {
                warnings.push(IntegrityWarning::PaymentReversed { raw_status: snapshot.raw_status.clone() });
            }
            ResolvedStatus::Known(CanonicalStatus::AwaitingPayment)
        } else {
            match mapped.canonical() {
                Some(CanonicalStatus::Completed) if snapshot.operator_validated => {
                    ResolvedStatus::Known(CanonicalStatus::Completed)
                }
                Some(CanonicalStatus::Completed) => {
                    warnings.push(IntegrityWarning::UnvalidatedCompletion);
                    if snapshot.rescheduled {
                        ResolvedStatus::Known(CanonicalStatus::Rescheduled)
                    } else {
                        ResolvedStatus::Known(CanonicalStatus::Confirmed)
                    }
                }
                Some(CanonicalStatus::Confirmed) if snapshot.rescheduled => {
                    ResolvedStatus::Known(CanonicalStatus::Rescheduled)
                }
                Some(status) => ResolvedStatus::Known(status),
                None => {
                    warnings.push(IntegrityWarning::UnknownStatusToken { token: snapshot.raw_status.clone() });
                    mapped.into_resolved()
                }
            }
        };

        if let Some(canonical) = status.canonical() {
            if canonical.requires_resource() && snapshot.assigned_operator_id.is_none() {
                warnings.push(IntegrityWarning::MissingResource { status: canonical });
            }
            if canonical.requires_date() && snapshot.scheduled_at.is_none() {
                warnings.push(IntegrityWarning::MissingDate { status: canonical });
            }
        }

        if !warnings.is_empty() {
            debug!(
                appointment_id = %snapshot.id,
                status = %status,
                warnings = ?warnings.iter().map(|w| w.code()).collect::<Vec<_>>(),
                "Resolved status with integrity warnings"
            );
        }

        StatusResolution { status, warnings, legacy_token }
    }
}
