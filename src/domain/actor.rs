//! Caller identity
//!
//! Resolved by the authentication layer in front of the service; the core
//! only performs capability checks against it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Operator,
    Admin,
    /// Sweeps, gateway callbacks
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Operator => "operator",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "customer" | "user" => Some(Self::Customer),
            "operator" => Some(Self::Operator),
            "admin" => Some(Self::Admin),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn system() -> Self {
        Self::new("system", ActorRole::System)
    }

    /// Back-office roles: may act on any booking and override schedules
    pub fn is_staff(&self) -> bool {
        matches!(
            self.role,
            ActorRole::Operator | ActorRole::Admin | ActorRole::System
        )
    }

    pub fn can_manage_booking(&self, created_by: &str) -> bool {
        self.is_staff() || self.id == created_by
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_manage_only_their_own_bookings() {
        let alice = Actor::new("alice", ActorRole::Customer);
        assert!(alice.can_manage_booking("alice"));
        assert!(!alice.can_manage_booking("bob"));
        assert!(Actor::new("op", ActorRole::Operator).can_manage_booking("bob"));
    }

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(ActorRole::from_str("Admin"), Some(ActorRole::Admin));
        assert_eq!(ActorRole::from_str("user"), Some(ActorRole::Customer));
        assert_eq!(ActorRole::from_str("root"), None);
    }
}
