use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Actor, ActorRole};

/// Claims carried by an access token. `role` is the only source of the
/// caller's role; request bodies never supply it.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActorClaims {
    pub sub: Uuid,
    pub role: ActorRole,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Actor, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<ActorClaims>(token, &DecodingKey::from_secret(jwt_secret.as_bytes()), &validation)
        .map_err(|e| {
            debug!("Token rejected: {}", e);
            match e.kind() {
                ErrorKind::ExpiredSignature => "Token expired".to_string(),
                ErrorKind::InvalidSignature => "Invalid token signature".to_string(),
                _ => "Invalid token".to_string(),
            }
        })?;

    let actor = Actor { id: data.claims.sub, role: data.claims.role };
    debug!(actor_id = %actor.id, role = %actor.role, "Token validated");
    Ok(actor)
}

/// Signs an HS256 token for `actor` that expires after `ttl`.
pub fn issue_token(actor: &Actor, jwt_secret: &str, ttl: Duration) -> Result<String, String> {
    if jwt_secret.is_empty() {
        return Err("JWT secret is not set".to_string());
    }

    let now = Utc::now();
    let claims = ActorClaims {
        sub: actor.id,
        role: actor.role,
        exp: (now + ttl).timestamp(),
        iat: Some(now.timestamp()),
    };

    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(jwt_secret.as_bytes()))
        .map_err(|e| format!("Failed to sign token: {}", e))
}
