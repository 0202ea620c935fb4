// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};
use shared_models::error::AppError;

use crate::models::{
    AllowedTransitionsResponse, AppointmentError, AppointmentSnapshot,
    ResolveStatusRequest, TransitionReceipt, TransitionRequest, ValidateTransitionRequest,
    ValidationResponse,
};
use crate::services::filters::{AppointmentQueryService, FilterParams, SortOrder};
use crate::services::legacy::map_status_token;
use crate::services::transition::TransitionService;

/// Shared state for the appointment lifecycle endpoints.
pub struct AppointmentHandlers {
    transitions: Arc<TransitionService>,
    queries: AppointmentQueryService,
}

impl AppointmentHandlers {
    pub fn new(transitions: Arc<TransitionService>) -> Self {
        let queries = AppointmentQueryService::new(*transitions.validator().resolver());
        Self { transitions, queries }
    }
}

// ==============================================================================
// REQUEST BODIES
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    pub predicate: String,
    #[serde(default)]
    pub params: FilterParams,
    pub sort: Option<SortOrder>,
    /// Filter these snapshots instead of the stored appointments.
    pub snapshots: Option<Vec<AppointmentSnapshot>>,
}

// ==============================================================================
// RESOLUTION AND VALIDATION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn resolve_status(
    State(state): State<Arc<AppointmentHandlers>>,
    Json(request): Json<ResolveStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let resolver = state.transitions.validator().resolver();
    let resolution = resolver.resolve_with_warnings(&request.snapshot, request.verification.as_ref());
    state.transitions.report_legacy_token(resolution.legacy_token.as_deref()).await;

    Ok(Json(json!({
        "appointment_id": request.snapshot.id,
        "status": resolution.status,
        "warnings": resolution.warnings,
        "legacy_token": resolution.legacy_token,
    })))
}

#[axum::debug_handler]
pub async fn get_allowed_transitions(
    State(state): State<Arc<AppointmentHandlers>>,
    Path(status): Path<String>,
) -> Result<Json<AllowedTransitionsResponse>, AppError> {
    let status = map_status_token(&status)
        .canonical()
        .ok_or(AppointmentError::UnknownStatus(status))?;

    Ok(Json(AllowedTransitionsResponse {
        status,
        allowed: state.transitions.validator().get_allowed_transitions(status),
    }))
}

#[axum::debug_handler]
pub async fn validate_transition(
    State(state): State<Arc<AppointmentHandlers>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<ValidateTransitionRequest>,
) -> Result<Json<ValidationResponse>, AppError> {
    state
        .transitions
        .observe_legacy_tokens(std::slice::from_ref(&request.snapshot))
        .await;
    let result = state
        .transitions
        .validator()
        .validate_transition(&request.snapshot, request.target, &actor);

    Ok(Json(ValidationResponse::for_role(result, actor.role)))
}

#[axum::debug_handler]
pub async fn filter_appointments(
    State(state): State<Arc<AppointmentHandlers>>,
    Json(request): Json<FilterRequest>,
) -> Result<Json<Value>, AppError> {
    let snapshots = match request.snapshots {
        Some(snapshots) => snapshots,
        None => state.transitions.list_appointments().await?,
    };
    state.transitions.observe_legacy_tokens(&snapshots).await;

    let appointments = state
        .queries
        .filter_by_name(snapshots, &request.predicate, &request.params, request.sort)?;

    Ok(Json(json!({
        "predicate": request.predicate,
        "count": appointments.len(),
        "appointments": appointments,
    })))
}

// ==============================================================================
// COMMIT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn transition_appointment(
    State(state): State<Arc<AppointmentHandlers>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionReceipt>, AppError> {
    let role = actor.role;
    let receipt = state
        .transitions
        .transition(appointment_id, request.target, actor, request.reason)
        .await
        .map_err(|e| to_app_error(e, role))?;

    Ok(Json(receipt))
}

#[axum::debug_handler]
pub async fn override_status(
    State(state): State<Arc<AppointmentHandlers>>,
    Path(appointment_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<TransitionReceipt>, AppError> {
    let role = actor.role;
    let receipt = state
        .transitions
        .override_status(appointment_id, request.target, actor, request.reason)
        .await
        .map_err(|e| to_app_error(e, role))?;

    Ok(Json(receipt))
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

/// Maps an appointment error for the acting role; rejection messages are
/// shaped by `Violation::message_for`.
fn to_app_error(error: AppointmentError, role: ActorRole) -> AppError {
    match error {
        AppointmentError::Rejected(result) => AppError::ValidationError(result.messages_for(role).join(" ")),
        other => other.into(),
    }
}

impl From<AppointmentError> for AppError {
    fn from(error: AppointmentError) -> Self {
        match error {
            AppointmentError::NotFound(id) => AppError::NotFound(format!("Appointment {} not found", id)),
            AppointmentError::StaleState { .. } => {
                AppError::Conflict("Appointment was changed by someone else; reload and try again".to_string())
            }
            AppointmentError::Rejected(result) => {
                AppError::ValidationError(result.messages_for(ActorRole::Requester).join(" "))
            }
            AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
            e @ (AppointmentError::UnknownFilter(_)
            | AppointmentError::InvalidFilterParams(_)
            | AppointmentError::UnknownStatus(_)) => AppError::BadRequest(e.to_string()),
            AppointmentError::Store(msg) => AppError::Internal(msg),
        }
    }
}

