// libs/appointment-cell/src/services/transition.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use monitoring_cell::{MetricsCollectorService, TransitionOutcome, TransitionTimer};
use shared_models::auth::Actor;

use crate::models::{
    AppointmentError, AppointmentSnapshot, CanonicalStatus, PaymentSignals, TransitionReceipt,
    TransitionRecord,
};
use crate::services::legacy::{map_status_token, MappedStatus};
use crate::services::lifecycle::TransitionValidator;
use crate::services::store::{AppointmentStore, PaymentVerifier, StoreError};

/// Validates and commits status transitions against the persistence
/// collaborator, timing every attempt into the metrics collector.
pub struct TransitionService {
    store: Arc<dyn AppointmentStore>,
    verifier: Option<Arc<dyn PaymentVerifier>>,
    validator: TransitionValidator,
    metrics: Arc<MetricsCollectorService>,
}

impl TransitionService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        validator: TransitionValidator,
        metrics: Arc<MetricsCollectorService>,
    ) -> Self {
        Self {
            store,
            verifier: None,
            validator,
            metrics,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn PaymentVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn validator(&self) -> &TransitionValidator {
        &self.validator
    }

    pub async fn list_appointments(&self) -> Result<Vec<AppointmentSnapshot>, AppointmentError> {
        self.store.list().await.map_err(|e| AppointmentError::Store(e.to_string()))
    }

    #[instrument(skip(self, actor, reason), fields(role = %actor.role))]
    pub async fn transition(
        &self,
        appointment_id: Uuid,
        target: CanonicalStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<TransitionReceipt, AppointmentError> {
        let (snapshot, verified_payment) = self.load_verified(appointment_id).await?;
        let resolution = self.validator.resolver().resolve_with_warnings(&snapshot, None);
        self.report_legacy_token(resolution.legacy_token.as_deref()).await;

        let timer = TransitionTimer::start(appointment_id, resolution.status.as_str(), target.as_str());
        let result = self.validator.validate_transition(&snapshot, target, &actor);

        if !result.ok {
            self.record_outcome(
                timer,
                TransitionOutcome::Rejected { categories: result.violation_codes() },
            )
            .await;
            return Err(AppointmentError::Rejected(Box::new(result)));
        }

        let record = TransitionRecord {
            from_status: snapshot.raw_status.clone(),
            to_status: target,
            actor,
            reason,
            committed_at: Utc::now(),
            is_override: false,
            payment: verified_payment,
        };

        let committed = self.commit(timer, &snapshot, record).await?;
        let after = self.validator.resolver().resolve_with_warnings(&committed, None);

        info!(
            appointment_id = %appointment_id,
            from = %result.current_status,
            to = %after.status,
            "Appointment status transition committed"
        );

        Ok(TransitionReceipt {
            appointment_id,
            from_status: result.current_status,
            status: after.status,
            committed_at: committed_at(&committed),
            warnings: after.warnings,
        })
    }

    /// Sets the administrator override. Bypasses the graph and every rule, so
    /// it is the only way out of a terminal state or an unknown raw token.
    #[instrument(skip(self, actor, reason), fields(role = %actor.role))]
    pub async fn override_status(
        &self,
        appointment_id: Uuid,
        status: CanonicalStatus,
        actor: Actor,
        reason: Option<String>,
    ) -> Result<TransitionReceipt, AppointmentError> {
        if !actor.is_administrator() {
            warn!(appointment_id = %appointment_id, actor_id = %actor.id, "Non-administrator attempted status override");
            return Err(AppointmentError::Forbidden(
                "Only administrators may override appointment status".to_string(),
            ));
        }

        let (snapshot, verified_payment) = self.load_verified(appointment_id).await?;
        let resolution = self.validator.resolver().resolve_with_warnings(&snapshot, None);
        self.report_legacy_token(resolution.legacy_token.as_deref()).await;
        let before = resolution.status;
        let timer = TransitionTimer::start(appointment_id, before.as_str(), status.as_str());

        let record = TransitionRecord {
            from_status: snapshot.raw_status.clone(),
            to_status: status,
            actor,
            reason,
            committed_at: Utc::now(),
            is_override: true,
            payment: verified_payment,
        };

        let committed = self.commit(timer, &snapshot, record).await?;
        let after = self.validator.resolver().resolve_with_warnings(&committed, None);

        info!(
            appointment_id = %appointment_id,
            from = %before,
            to = %after.status,
            "Appointment status overridden by administrator"
        );

        Ok(TransitionReceipt {
            appointment_id,
            from_status: before,
            status: after.status,
            committed_at: committed_at(&committed),
            warnings: after.warnings,
        })
    }

    /// Loads the snapshot and folds in a fresh provider result when a verifier
    /// and payment reference are available. Provider failures fall back to the
    /// stored payment signals.
    ///
    /// The second element carries the refreshed signals so the commit persists
    /// what the validation saw.
    async fn load_verified(
        &self,
        appointment_id: Uuid,
    ) -> Result<(AppointmentSnapshot, Option<PaymentSignals>), AppointmentError> {
        let snapshot = self.store.load(appointment_id).await.map_err(|e| match e {
            StoreError::NotFound(id) => AppointmentError::NotFound(id),
            other => AppointmentError::Store(other.to_string()),
        })?;

        let (verifier, reference) = match (&self.verifier, snapshot.payment.payment_reference.clone()) {
            (Some(verifier), Some(reference)) => (verifier, reference),
            _ => return Ok((snapshot, None)),
        };

        match verifier.verify(&reference).await {
            Ok(verification) => {
                let snapshot = snapshot.with_verification(&verification);
                let payment = snapshot.payment.clone();
                Ok((snapshot, Some(payment)))
            }
            Err(e) => {
                warn!(
                    appointment_id = %appointment_id,
                    "Payment verification failed, using stored payment signals: {}", e
                );
                Ok((snapshot, None))
            }
        }
    }

    /// Counts a deprecated raw token seen while resolving, on read and write paths alike.
    pub async fn report_legacy_token(&self, token: Option<&str>) {
        if let Some(token) = token {
            self.metrics.record_legacy_token(token).await;
        }
    }

    pub async fn observe_legacy_tokens(&self, snapshots: &[AppointmentSnapshot]) {
        for snapshot in snapshots {
            if let MappedStatus::Legacy { token, .. } = map_status_token(&snapshot.raw_status) {
                self.metrics.record_legacy_token(&token).await;
            }
        }
    }

    async fn commit(
        &self,
        timer: TransitionTimer,
        snapshot: &AppointmentSnapshot,
        record: TransitionRecord,
    ) -> Result<AppointmentSnapshot, AppointmentError> {
        match self.store.commit_transition(snapshot.id, snapshot.version, record).await {
            Ok(committed) => {
                self.record_outcome(timer, TransitionOutcome::Committed).await;
                Ok(committed)
            }
            Err(StoreError::StaleState { appointment_id, expected, actual }) => {
                warn!(
                    appointment_id = %appointment_id,
                    expected_version = expected,
                    actual_version = actual,
                    "Transition lost a concurrent commit"
                );
                self.record_outcome(timer, TransitionOutcome::StaleState).await;
                Err(AppointmentError::StaleState {
                    appointment_id,
                    expected_status: snapshot.raw_status.clone(),
                })
            }
            Err(StoreError::NotFound(id)) => {
                self.record_outcome(timer, TransitionOutcome::Failed { reason: "not found".to_string() })
                    .await;
                Err(AppointmentError::NotFound(id))
            }
            Err(e) => {
                self.record_outcome(timer, TransitionOutcome::Failed { reason: e.to_string() }).await;
                Err(AppointmentError::Store(e.to_string()))
            }
        }
    }

    async fn record_outcome(&self, timer: TransitionTimer, outcome: TransitionOutcome) {
        if let Err(e) = self.metrics.record_transition_outcome(timer, outcome).await {
            warn!("Failed to record transition outcome: {}", e);
        }
    }
}

fn committed_at(snapshot: &AppointmentSnapshot) -> chrono::DateTime<Utc> {
    snapshot
        .history
        .last()
        .map(|record| record.committed_at)
        .unwrap_or_else(Utc::now)
}
