// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AppointmentSnapshot, PaymentVerification, TransitionRecord};

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("appointment not found: {0}")]
    NotFound(Uuid),

    /// The conditional write found a different version than the caller read.
    #[error("stale state on appointment {appointment_id}: expected version {expected}, found {actual}")]
    StaleState {
        appointment_id: Uuid,
        expected: u64,
        actual: u64,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence collaborator for appointment records.
///
/// `commit_transition` is an atomic conditional write: it applies the record
/// only while the stored `version` still equals `expected_version`, bumps the
/// version, and appends to history in commit order. Any committed transition
/// or override invalidates older reads, including ones that leave the raw
/// status untouched. Implementations stamp `committed_at`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn load(&self, appointment_id: Uuid) -> Result<AppointmentSnapshot, StoreError>;

    async fn commit_transition(
        &self,
        appointment_id: Uuid,
        expected_version: u64,
        record: TransitionRecord,
    ) -> Result<AppointmentSnapshot, StoreError>;

    async fn list(&self) -> Result<Vec<AppointmentSnapshot>, StoreError>;
}

/// Payment provider lookup by payment reference.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, payment_reference: &str) -> Result<PaymentVerification, String>;
}

/// Process-local store; the write lock makes compare-and-commit atomic.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAppointmentStore {
    appointments: Arc<RwLock<HashMap<Uuid, AppointmentSnapshot>>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, snapshot: AppointmentSnapshot) {
        self.appointments.write().await.insert(snapshot.id, snapshot);
    }

    pub async fn get(&self, appointment_id: Uuid) -> Option<AppointmentSnapshot> {
        self.appointments.read().await.get(&appointment_id).cloned()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn load(&self, appointment_id: Uuid) -> Result<AppointmentSnapshot, StoreError> {
        self.get(appointment_id).await.ok_or(StoreError::NotFound(appointment_id))
    }

    async fn commit_transition(
        &self,
        appointment_id: Uuid,
        expected_version: u64,
        mut record: TransitionRecord,
    ) -> Result<AppointmentSnapshot, StoreError> {
        let mut appointments = self.appointments.write().await;
        let snapshot = appointments
            .get_mut(&appointment_id)
            .ok_or(StoreError::NotFound(appointment_id))?;

        if snapshot.version != expected_version {
            return Err(StoreError::StaleState {
                appointment_id,
                expected: expected_version,
                actual: snapshot.version,
            });
        }

        record.committed_at = Utc::now();
        debug!(
            appointment_id = %appointment_id,
            to = %record.to_status,
            is_override = record.is_override,
            "Committing transition"
        );
        snapshot.apply_transition(record);
        Ok(snapshot.clone())
    }

    async fn list(&self) -> Result<Vec<AppointmentSnapshot>, StoreError> {
        Ok(self.appointments.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CanonicalStatus, PaymentSignals};
    use assert_matches::assert_matches;
    use shared_models::auth::Actor;

    fn record(to_status: CanonicalStatus) -> TransitionRecord {
        TransitionRecord {
            from_status: "awaiting_payment".to_string(),
            to_status,
            actor: Actor::administrator(Uuid::new_v4()),
            reason: None,
            committed_at: Utc::now(),
            is_override: false,
            payment: None,
        }
    }

    #[tokio::test]
    async fn test_commit_applies_when_version_matches() {
        let store = InMemoryAppointmentStore::new();
        let snapshot = AppointmentSnapshot::new(Uuid::new_v4(), Uuid::new_v4());
        let id = snapshot.id;
        store.insert(snapshot).await;

        let updated = store
            .commit_transition(id, 0, record(CanonicalStatus::PaymentProcessing))
            .await
            .unwrap();
        assert_eq!(updated.raw_status, "payment_processing");
        assert_eq!(updated.history.len(), 1);
        assert_eq!(updated.version, 1);
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_expectation() {
        let store = InMemoryAppointmentStore::new();
        let snapshot = AppointmentSnapshot::new(Uuid::new_v4(), Uuid::new_v4());
        let id = snapshot.id;
        store.insert(snapshot).await;

        store
            .commit_transition(id, 0, record(CanonicalStatus::Cancelled))
            .await
            .unwrap();
        let second = store
            .commit_transition(id, 0, record(CanonicalStatus::PaymentProcessing))
            .await;

        assert_matches!(second, Err(StoreError::StaleState { expected: 0, actual: 1, .. }));
        assert_eq!(store.get(id).await.unwrap().history.len(), 1);
    }

    #[tokio::test]
    async fn test_override_invalidates_earlier_read() {
        let store = InMemoryAppointmentStore::new();
        let snapshot = AppointmentSnapshot::new(Uuid::new_v4(), Uuid::new_v4());
        let id = snapshot.id;
        store.insert(snapshot).await;

        let read = store.load(id).await.unwrap();
        let mut override_record = record(CanonicalStatus::Cancelled);
        override_record.is_override = true;
        let overridden = store.commit_transition(id, read.version, override_record).await.unwrap();
        assert_eq!(overridden.raw_status, read.raw_status);

        let late = store
            .commit_transition(id, read.version, record(CanonicalStatus::PaymentProcessing))
            .await;
        assert_matches!(late, Err(StoreError::StaleState { .. }));

        let stored = store.get(id).await.unwrap();
        assert_eq!(stored.admin_override, Some(CanonicalStatus::Cancelled));
        assert_eq!(stored.history.len(), 1);
    }

    #[tokio::test]
    async fn test_commit_persists_verified_payment() {
        let store = InMemoryAppointmentStore::new();
        let snapshot = AppointmentSnapshot::new(Uuid::new_v4(), Uuid::new_v4());
        let id = snapshot.id;
        store.insert(snapshot).await;

        let mut with_payment = record(CanonicalStatus::AwaitingMatch);
        with_payment.payment = Some(PaymentSignals {
            provider_verified: true,
            provider_status: Some("succeeded".to_string()),
            ..PaymentSignals::default()
        });
        store.commit_transition(id, 0, with_payment).await.unwrap();

        let stored = store.get(id).await.unwrap();
        assert!(stored.payment.provider_verified);
        assert_eq!(stored.payment.provider_status.as_deref(), Some("succeeded"));
    }

    #[tokio::test]
    async fn test_missing_appointment() {
        let store = InMemoryAppointmentStore::new();
        let id = Uuid::new_v4();
        assert_matches!(store.load(id).await, Err(StoreError::NotFound(missing)) if missing == id);
    }
}
