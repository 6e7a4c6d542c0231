//! Branch-scope filter over in-memory collections.

use super::{AccessContext, Visibility};
use crate::models::{Appointment, Drug, Principal};

/// Items tagged with the branch they belong to.
pub trait BranchScoped {
    fn branch_id(&self) -> Option<&str>;
}

impl BranchScoped for Appointment {
    fn branch_id(&self) -> Option<&str> {
        Some(&self.branch_id)
    }
}

impl BranchScoped for Drug {
    fn branch_id(&self) -> Option<&str> {
        Some(&self.branch_id)
    }
}

impl BranchScoped for Principal {
    fn branch_id(&self) -> Option<&str> {
        self.branch_id.as_deref()
    }
}

/// Keep the items visible to `ctx`.
pub fn filter<T: BranchScoped>(items: Vec<T>, ctx: &AccessContext) -> Vec<T> {
    filter_by(items, ctx, |item| item.branch_id())
}

/// Keep the items visible to `ctx`, reading each item's branch with `key`.
///
/// Untagged items are dropped for branch-restricted principals.
pub fn filter_by<T, F>(items: Vec<T>, ctx: &AccessContext, key: F) -> Vec<T>
where
    F: Fn(&T) -> Option<&str>,
{
    match ctx.visibility() {
        Visibility::Unrestricted => items,
        Visibility::Nothing => Vec::new(),
        Visibility::Branch(own) => items
            .into_iter()
            .filter(|item| key(item) == Some(own.as_str()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn appt(branch: &str) -> Appointment {
        Appointment::requested(
            "p".into(),
            branch.into(),
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        )
    }

    fn ctx(role: Role, branch: Option<&str>, superuser: bool) -> AccessContext {
        AccessContext {
            principal_id: "x".into(),
            role,
            branch_id: branch.map(str::to_string),
            is_superuser: superuser,
        }
    }

    #[test]
    fn test_filter_rules() {
        let items = || vec![appt("b1"), appt("b2"), appt("b1")];

        assert_eq!(filter(items(), &ctx(Role::Admin, Some("b2"), true)).len(), 3);
        assert_eq!(filter(items(), &ctx(Role::Owner, None, false)).len(), 3);
        assert!(filter(items(), &ctx(Role::Admin, None, false)).is_empty());
        assert_eq!(filter(items(), &ctx(Role::Vet, Some("b1"), false)).len(), 2);
    }

    #[test]
    fn test_untagged_staff_hidden() {
        let staff = vec![
            Principal::new("a".into(), Role::Vet).in_branch("b1"),
            Principal::new("b".into(), Role::Vet),
        ];
        let visible = filter(staff, &ctx(Role::AdminOp, Some("b1"), false));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].username, "a");
    }

    proptest! {
        #[test]
        fn prop_branch_filter_keeps_only_own_branch(
            branches in prop::collection::vec(0u8..4, 0..30),
            own in 0u8..4,
        ) {
            let items: Vec<Appointment> = branches.iter().map(|b| appt(&format!("b{}", b))).collect();
            let own_id = format!("b{}", own);
            let expected = branches.iter().filter(|b| **b == own).count();

            let visible = filter(items, &ctx(Role::Admin, Some(&own_id), false));
            prop_assert_eq!(visible.len(), expected);
            prop_assert!(visible.iter().all(|a| a.branch_id == own_id));
        }

        #[test]
        fn prop_unaffiliated_staff_see_nothing(
            branches in prop::collection::vec(0u8..4, 0..30),
        ) {
            let items: Vec<Appointment> = branches.iter().map(|b| appt(&format!("b{}", b))).collect();
            for role in [Role::Admin, Role::AdminOp, Role::Vet] {
                prop_assert!(filter(items.clone(), &ctx(role, None, false)).is_empty());
            }
        }
    }
}
