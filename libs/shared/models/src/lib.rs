pub mod auth;
pub mod error;

pub use auth::{Actor, ActorRole};
pub use error::AppError;
