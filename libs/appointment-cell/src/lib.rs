// =====================================================================================
// APPOINTMENT CELL - STATUS LIFECYCLE ENGINE
// =====================================================================================
//
// - Legacy status token mapping and the canonical transition graph
// - Status resolution from raw record signals, with integrity warnings
// - Transition validation (graph, structural rules, immutability, authorization)
// - Filter/query predicates over resolved status
// - Conditional commits through the persistence and payment collaborator traits
//
// =====================================================================================

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{
    AppointmentError, AppointmentSnapshot, CanonicalStatus, IntegrityWarning, ResolvedStatus,
    TransitionRecord, ValidationResult, Violation,
};

pub use services::{
    AppointmentFilter, AppointmentQueryService, AppointmentStore, InMemoryAppointmentStore,
    PaymentVerifier, StatusResolver, StoreError, TransitionService, TransitionValidator,
};

pub use handlers::AppointmentHandlers;
pub use router::appointment_routes;
