//! Principal (account) models and roles.

use serde::{Deserialize, Serialize};

/// Account role. Closed set; every guard matches on it exhaustively.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Branch administrator
    Admin,
    /// Veterinarian
    Vet,
    /// Front-desk operator
    AdminOp,
    /// Pet owner
    Owner,
}

impl Role {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Vet => "VET",
            Role::AdminOp => "ADMIN_OP",
            Role::Owner => "OWNER",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMIN" => Some(Role::Admin),
            "VET" => Some(Role::Vet),
            "ADMIN_OP" => Some(Role::AdminOp),
            "OWNER" => Some(Role::Owner),
            _ => None,
        }
    }

    /// Roles whose visibility is limited to their branch.
    pub fn is_branch_scoped(&self) -> bool {
        match self {
            Role::Admin | Role::AdminOp | Role::Vet => true,
            Role::Owner => false,
        }
    }

    /// Front-desk roles allowed to manage appointments.
    pub fn is_desk(&self) -> bool {
        matches!(self, Role::Admin | Role::AdminOp)
    }
}

/// An authenticated actor: staff or owner account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    /// Unique principal ID
    pub id: String,
    /// Login name
    pub username: String,
    /// Human-readable name
    pub display_name: String,
    /// Account role
    pub role: Role,
    /// Branch affiliation; may be missing even for staff roles
    pub branch_id: Option<String>,
    /// Inactive vets cannot receive new appointments
    pub active: bool,
    /// Superusers bypass branch scoping
    pub superuser: bool,
    /// Clinical specialty (vets only)
    pub specialty: Option<String>,
}

impl Principal {
    /// Create an active, non-superuser principal.
    pub fn new(username: String, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: username.clone(),
            username,
            role,
            branch_id: None,
            active: true,
            superuser: false,
            specialty: None,
        }
    }

    /// Builder-style branch affiliation.
    pub fn in_branch(mut self, branch_id: &str) -> Self {
        self.branch_id = Some(branch_id.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip_strings() {
        for role in [Role::Admin, Role::Vet, Role::AdminOp, Role::Owner] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn test_owner_is_not_branch_scoped() {
        assert!(!Role::Owner.is_branch_scoped());
        assert!(Role::Vet.is_branch_scoped());
        assert!(!Role::Vet.is_desk());
        assert!(Role::AdminOp.is_desk());
    }
}
