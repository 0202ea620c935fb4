// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::auth::{Actor, ActorRole};

use crate::models::{AppointmentSnapshot, CanonicalStatus, ValidationResult, Violation};
use crate::services::graph;
use crate::services::resolver::StatusResolver;

/// Composes graph legality, structural rules, immutability and actor
/// authorization into a single side-effect-free check.
///
/// Every rule is evaluated so callers get the full violation list in one pass.
#[derive(Debug, Clone, Copy)]
pub struct TransitionValidator {
    resolver: StatusResolver,
}

impl TransitionValidator {
    pub fn new(resolver: StatusResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &StatusResolver {
        &self.resolver
    }

    /// Get all valid next statuses for a given current status
    pub fn get_allowed_transitions(&self, status: CanonicalStatus) -> Vec<CanonicalStatus> {
        graph::allowed_transitions(status).to_vec()
    }

    pub fn validate_transition(
        &self,
        snapshot: &AppointmentSnapshot,
        target: CanonicalStatus,
        actor: &Actor,
    ) -> ValidationResult {
        let resolution = self.resolver.resolve_with_warnings(snapshot, None);
        let current = resolution.status;
        let mut violations = Vec::new();

        debug!(
            appointment_id = %snapshot.id,
            from = %current,
            to = %target,
            role = %actor.role,
            "Validating status transition"
        );

        // Graph legality
        let legal = current
            .canonical()
            .map(|from| graph::is_allowed(from, target))
            .unwrap_or(false);
        if !legal {
            violations.push(Violation::InvalidTransition { from: current.clone(), to: target });
        }

        // Structural rules
        if target.requires_resource() && snapshot.assigned_operator_id.is_none() {
            violations.push(Violation::MissingResource);
        }
        if target.requires_date() && snapshot.scheduled_at.is_none() {
            violations.push(Violation::MissingDate);
        }
        if target == CanonicalStatus::AwaitingMatch && !self.resolver.payment_gate_satisfied(&snapshot.payment) {
            violations.push(Violation::PaymentNotComplete);
        }

        // Immutability
        let terminal = current.canonical().filter(|s| s.is_terminal());
        if let Some(status) = terminal {
            if !actor.is_administrator() {
                violations.push(Violation::TerminalImmutable { status });
            }
        }

        // Authorization
        match actor.role {
            ActorRole::Administrator => {}
            ActorRole::Requester => {
                if snapshot.requester_id != actor.id {
                    violations.push(Violation::NotOwner);
                }
                if terminal.is_some() || requester_may_not_target(target) {
                    violations.push(Violation::RequesterForbidden { target });
                }
            }
            ActorRole::Operator => {
                if snapshot.assigned_operator_id != Some(actor.id) {
                    violations.push(Violation::NotAssignedOperator);
                }
                if current.is(CanonicalStatus::Cancelled) {
                    violations.push(Violation::OperatorForbiddenCancelled);
                }
            }
        }

        let ok = violations.is_empty();
        if !ok {
            warn!(
                appointment_id = %snapshot.id,
                from = %current,
                to = %target,
                violations = ?violations.iter().map(|v| v.code()).collect::<Vec<_>>(),
                "Status transition rejected"
            );
        }

        ValidationResult {
            ok,
            current_status: current,
            target,
            violations,
            warnings: resolution.warnings,
        }
    }
}

/// Fulfilment outcomes are recorded by the operator or an administrator.
fn requester_may_not_target(target: CanonicalStatus) -> bool {
    matches!(target, CanonicalStatus::Completed | CanonicalStatus::NoShow)
}
