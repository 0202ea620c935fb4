use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a principal acts under when touching appointment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Requester,
    Operator,
    Administrator,
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Requester => write!(f, "requester"),
            ActorRole::Operator => write!(f, "operator"),
            ActorRole::Administrator => write!(f, "administrator"),
        }
    }
}

/// An authenticated principal, derived from a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn requester(id: Uuid) -> Self {
        Self { id, role: ActorRole::Requester }
    }

    pub fn operator(id: Uuid) -> Self {
        Self { id, role: ActorRole::Operator }
    }

    pub fn administrator(id: Uuid) -> Self {
        Self { id, role: ActorRole::Administrator }
    }

    pub fn is_administrator(&self) -> bool {
        self.role == ActorRole::Administrator
    }
}
