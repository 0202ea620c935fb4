use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{typed_header::TypedHeaderRejection, TypedHeader};
use headers::{authorization::Bearer, Authorization};
use tracing::warn;

use shared_config::AppConfig;
use shared_models::auth::Actor;
use shared_models::error::AppError;

use crate::jwt::validate_token;

/// Validates the bearer token and stores the resulting [`Actor`] in the
/// request extensions for `Extension<Actor>` extraction downstream.
pub async fn auth_middleware(
    State(config): State<Arc<AppConfig>>,
    authorization: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = authorization.map_err(|rejection| {
        if rejection.is_missing() {
            AppError::Auth("Missing authorization header".to_string())
        } else {
            AppError::Auth("Invalid authorization header format".to_string())
        }
    })?;

    let actor = validate_token(bearer.token(), &config.jwt_secret).map_err(AppError::Auth)?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

/// Must run inside [`auth_middleware`].
pub async fn require_administrator(request: Request, next: Next) -> Result<Response, AppError> {
    let actor = request
        .extensions()
        .get::<Actor>()
        .ok_or_else(|| AppError::Auth("Request is not authenticated".to_string()))?;

    if !actor.is_administrator() {
        warn!(actor_id = %actor.id, role = %actor.role, path = %request.uri().path(), "Administrator route refused");
        return Err(AppError::Forbidden("Administrator role required".to_string()));
    }

    Ok(next.run(request).await)
}
