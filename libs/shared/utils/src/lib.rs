pub mod extractor;
pub mod jwt;

pub use extractor::{auth_middleware, require_administrator};
pub use jwt::{issue_token, validate_token, ActorClaims};
