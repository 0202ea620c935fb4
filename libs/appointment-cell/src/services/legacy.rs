// libs/appointment-cell/src/services/legacy.rs
use crate::models::{CanonicalStatus, ResolvedStatus};

/// Every status token ever persisted under a deprecated vocabulary.
///
/// Entries are never removed: rows written years ago must keep resolving.
pub const LEGACY_STATUS_TABLE: &[(&str, CanonicalStatus)] = &[
    ("pending", CanonicalStatus::AwaitingPayment),
    ("pending_payment", CanonicalStatus::AwaitingPayment),
    ("payment_pending", CanonicalStatus::AwaitingPayment),
    ("unpaid", CanonicalStatus::AwaitingPayment),
    ("processing", CanonicalStatus::PaymentProcessing),
    ("payment_initiated", CanonicalStatus::PaymentProcessing),
    ("paid", CanonicalStatus::AwaitingMatch),
    ("searching", CanonicalStatus::AwaitingMatch),
    ("matching", CanonicalStatus::AwaitingMatch),
    ("matched", CanonicalStatus::MatchPendingAcceptance),
    ("proposed", CanonicalStatus::MatchPendingAcceptance),
    ("accepted", CanonicalStatus::AwaitingScheduling),
    ("scheduling", CanonicalStatus::AwaitingScheduling),
    ("approved", CanonicalStatus::Confirmed),
    ("scheduled", CanonicalStatus::Confirmed),
    ("booked", CanonicalStatus::Confirmed),
    ("done", CanonicalStatus::Completed),
    ("finished", CanonicalStatus::Completed),
    ("canceled", CanonicalStatus::Cancelled),
    ("declined", CanonicalStatus::Cancelled),
    ("refunded", CanonicalStatus::Cancelled),
    ("missed", CanonicalStatus::NoShow),
    ("absent", CanonicalStatus::NoShow),
];

/// Outcome of looking a raw token up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedStatus {
    /// Already in the current vocabulary.
    Canonical(CanonicalStatus),
    /// Translated from a deprecated token.
    Legacy { token: String, status: CanonicalStatus },
    /// Not known to either vocabulary; passed through untouched.
    Unmapped(String),
}

impl MappedStatus {
    pub fn canonical(&self) -> Option<CanonicalStatus> {
        match self {
            MappedStatus::Canonical(status) | MappedStatus::Legacy { status, .. } => Some(*status),
            MappedStatus::Unmapped(_) => None,
        }
    }

    pub fn into_resolved(self) -> ResolvedStatus {
        match self {
            MappedStatus::Canonical(status) | MappedStatus::Legacy { status, .. } => ResolvedStatus::Known(status),
            MappedStatus::Unmapped(token) => ResolvedStatus::Unknown(token),
        }
    }
}

fn normalize(token: &str) -> String {
    token
        .trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Total mapping from any raw token to the current vocabulary.
///
/// Canonical tokens are checked first so they are never re-mapped. Unknown
/// tokens come back verbatim (not normalized) for generic display.
pub fn map_status_token(token: &str) -> MappedStatus {
    let normalized = normalize(token);

    if let Some(status) = CanonicalStatus::from_token(&normalized) {
        return MappedStatus::Canonical(status);
    }

    LEGACY_STATUS_TABLE
        .iter()
        .find(|(legacy, _)| *legacy == normalized)
        .map(|(legacy, status)| MappedStatus::Legacy { token: legacy.to_string(), status: *status })
        .unwrap_or_else(|| MappedStatus::Unmapped(token.to_string()))
}
