//! Identity & role context, branch scoping and the authorization gate.
//!
//! Every lifecycle and listing call takes an explicit [`AccessContext`];
//! nothing here reads ambient request state.

mod gate;
mod scope;

pub use gate::*;
pub use scope::*;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::models::{Principal, Role};

/// Access errors.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unknown principal: {0}")]
    UnknownPrincipal(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl AccessError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;

/// The resolved identity of the acting principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    pub principal_id: String,
    pub role: Role,
    /// Branch affiliation; `None` scopes branch roles to nothing
    pub branch_id: Option<String>,
    pub is_superuser: bool,
}

/// What part of the branch-tagged data a principal may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visibility {
    /// No branch restriction (superusers, and owners who are scoped by ownership)
    Unrestricted,
    /// Only items tagged with this branch
    Branch(String),
    /// Branch role without an affiliation
    Nothing,
}

impl Visibility {
    /// Whether an item tagged with `branch_id` is visible.
    pub fn covers(&self, branch_id: &str) -> bool {
        match self {
            Visibility::Unrestricted => true,
            Visibility::Branch(own) => own == branch_id,
            Visibility::Nothing => false,
        }
    }
}

impl AccessContext {
    pub fn from_principal(principal: &Principal) -> Self {
        Self {
            principal_id: principal.id.clone(),
            role: principal.role,
            branch_id: principal.branch_id.clone(),
            is_superuser: principal.superuser,
        }
    }

    /// Branch visibility for this principal. Fails closed when a branch role
    /// has no affiliation.
    pub fn visibility(&self) -> Visibility {
        if self.is_superuser || !self.role.is_branch_scoped() {
            return Visibility::Unrestricted;
        }
        match &self.branch_id {
            Some(branch_id) => Visibility::Branch(branch_id.clone()),
            None => Visibility::Nothing,
        }
    }

    /// Role check for an action. Superusers pass regardless of role.
    pub fn require_role(&self, action: &str, allowed: impl Fn(&Role) -> bool) -> AccessResult<()> {
        if self.is_superuser || allowed(&self.role) {
            Ok(())
        } else {
            Err(AccessError::Forbidden(format!(
                "{} may not {}",
                self.role.as_str(),
                action
            )))
        }
    }

    /// Whether this principal acts as an owner (and so is scoped by ownership).
    pub fn is_owner(&self) -> bool {
        !self.is_superuser && self.role == Role::Owner
    }
}

/// Resolve the acting principal into an [`AccessContext`].
pub fn resolve_context(db: &Database, principal_id: &str) -> AccessResult<AccessContext> {
    let principal = db
        .get_principal(principal_id)?
        .ok_or_else(|| AccessError::UnknownPrincipal(principal_id.to_string()))?;
    if !principal.active {
        warn!("inactive principal {} refused", principal.username);
        return Err(AccessError::Forbidden(format!(
            "principal {} is inactive",
            principal_id
        )));
    }

    let ctx = AccessContext::from_principal(&principal);
    debug!(
        "resolved principal {} as {} (branch {:?}, superuser {})",
        principal.username,
        ctx.role.as_str(),
        ctx.branch_id,
        ctx.is_superuser
    );
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Branch;

    fn ctx(role: Role, branch: Option<&str>, superuser: bool) -> AccessContext {
        AccessContext {
            principal_id: "p".into(),
            role,
            branch_id: branch.map(str::to_string),
            is_superuser: superuser,
        }
    }

    #[test]
    fn test_visibility() {
        assert_eq!(ctx(Role::Admin, None, true).visibility(), Visibility::Unrestricted);
        assert_eq!(ctx(Role::Owner, None, false).visibility(), Visibility::Unrestricted);
        assert_eq!(ctx(Role::Admin, None, false).visibility(), Visibility::Nothing);
        assert_eq!(ctx(Role::Vet, None, false).visibility(), Visibility::Nothing);
        assert_eq!(
            ctx(Role::AdminOp, Some("b1"), false).visibility(),
            Visibility::Branch("b1".into())
        );

        assert!(Visibility::Branch("b1".into()).covers("b1"));
        assert!(!Visibility::Branch("b1".into()).covers("b2"));
        assert!(!Visibility::Nothing.covers("b1"));
    }

    #[test]
    fn test_require_role() {
        let vet = ctx(Role::Vet, Some("b1"), false);
        assert!(vet.require_role("attend", |r| *r == Role::Vet).is_ok());
        assert!(matches!(
            vet.require_role("cancel", Role::is_desk),
            Err(AccessError::Forbidden(_))
        ));

        // Superuser passes role checks whatever the role string says
        let root = ctx(Role::Owner, None, true);
        assert!(root.require_role("cancel", Role::is_desk).is_ok());
        assert!(!root.is_owner());
    }

    #[test]
    fn test_resolve_context() {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Central".into(), "A".into());
        db.insert_branch(&branch).unwrap();
        let admin = Principal::new("ana".into(), Role::Admin).in_branch(&branch.id);
        db.insert_principal(&admin).unwrap();

        let resolved = resolve_context(&db, &admin.id).unwrap();
        assert_eq!(resolved.role, Role::Admin);
        assert_eq!(resolved.branch_id.as_deref(), Some(branch.id.as_str()));

        assert!(matches!(
            resolve_context(&db, "ghost"),
            Err(AccessError::UnknownPrincipal(_))
        ));
    }
}
