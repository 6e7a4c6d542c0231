//! Scoped listings for appointments, patients, owners and staff.

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::access::{filter, AccessContext, AccessError, AccessResult, Gate, Visibility};
use crate::db::{AppointmentQuery, Database};
use crate::models::{Appointment, AppointmentState, Owner, Patient, Principal};

/// Appointment listing filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentFilter {
    pub state: Option<AppointmentState>,
    pub vet_id: Option<String>,
    /// Ignored for owners, who only ever see their own
    pub owner_id: Option<String>,
    pub patient_id: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Patient name, owner name or notes
    pub text: Option<String>,
    pub limit: Option<usize>,
}

/// Turn the principal's scope into a query restriction. `None` means the
/// principal sees nothing.
fn scoped_query(db: &Database, ctx: &AccessContext) -> AccessResult<Option<AppointmentQuery>> {
    let mut query = AppointmentQuery::default();
    if ctx.is_owner() {
        match Gate::new(db, ctx).owner_profile()? {
            Some(owner) => query.owner_id = Some(owner.id),
            None => {
                debug!("owner {} has no profile yet", ctx.principal_id);
                return Ok(None);
            }
        }
        return Ok(Some(query));
    }

    match ctx.visibility() {
        Visibility::Unrestricted => {}
        Visibility::Branch(own) => query.branch_id = Some(own),
        Visibility::Nothing => {
            debug!("principal {} has no branch, listing nothing", ctx.principal_id);
            return Ok(None);
        }
    }
    Ok(Some(query))
}

/// Appointments visible to the principal, matching `filter`.
///
/// Ordered by confirmed time, unconfirmed last by requested date.
pub fn list_appointments(
    db: &Database,
    ctx: &AccessContext,
    filter: &AppointmentFilter,
) -> AccessResult<Vec<Appointment>> {
    let Some(mut query) = scoped_query(db, ctx)? else {
        return Ok(Vec::new());
    };
    if query.owner_id.is_none() {
        query.owner_id = filter.owner_id.clone();
    }
    query.state = filter.state;
    query.vet_id = filter.vet_id.clone();
    query.patient_id = filter.patient_id.clone();
    query.from = filter.from;
    query.to = filter.to;
    query.text = filter.text.clone();
    query.limit = filter.limit;

    Ok(db.query_appointments(&query)?)
}

/// Patients whose name starts with `prefix`. Staff see patients seen at
/// their branch; owners see their own pets.
pub fn search_patients(
    db: &Database,
    ctx: &AccessContext,
    prefix: &str,
    limit: usize,
) -> AccessResult<Vec<Patient>> {
    if ctx.is_owner() {
        let Some(owner) = Gate::new(db, ctx).owner_profile()? else {
            return Ok(Vec::new());
        };
        let needle = prefix.to_lowercase();
        return Ok(db
            .list_patients_for_owner(&owner.id)?
            .into_iter()
            .filter(|p| p.name.to_lowercase().starts_with(&needle))
            .take(limit)
            .collect());
    }

    match ctx.visibility() {
        Visibility::Nothing => Ok(Vec::new()),
        Visibility::Branch(own) => Ok(db.search_patients(Some(&own), prefix, limit)?),
        Visibility::Unrestricted => Ok(db.search_patients(None, prefix, limit)?),
    }
}

/// Owner profiles matching `query`, for staff.
pub fn search_owners(
    db: &Database,
    ctx: &AccessContext,
    query: &str,
    limit: usize,
) -> AccessResult<Vec<Owner>> {
    if ctx.is_owner() {
        return Err(AccessError::Forbidden("owners cannot browse other owners".into()));
    }

    match ctx.visibility() {
        Visibility::Nothing => Ok(Vec::new()),
        Visibility::Branch(own) => Ok(db.search_owners(Some(&own), query, limit)?),
        Visibility::Unrestricted => Ok(db.search_owners(None, query, limit)?),
    }
}

/// Active vets of a branch, as far as the principal may see them.
pub fn list_vets(
    db: &Database,
    ctx: &AccessContext,
    branch_id: &str,
) -> AccessResult<Vec<Principal>> {
    let branch = Gate::new(db, ctx).branch(branch_id)?;
    let vets = db
        .list_vets_in_branch(&branch.id)?
        .into_iter()
        .filter(|v| v.active)
        .collect();
    Ok(filter(vets, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, Role};

    struct Fixture {
        db: Database,
        central: Branch,
        north: Branch,
        owner: AccessContext,
        patient: Patient,
        vet: Principal,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let central = Branch::new("Central".into(), "A".into());
        let north = Branch::new("North".into(), "B".into());
        db.insert_branch(&central).unwrap();
        db.insert_branch(&north).unwrap();

        let owner_principal = Principal::new("carlos".into(), Role::Owner);
        let vet = Principal::new("vera".into(), Role::Vet).in_branch(&central.id);
        db.insert_principal(&owner_principal).unwrap();
        db.insert_principal(&vet).unwrap();
        let owner = Owner::new(owner_principal.id.clone());
        db.insert_owner(&owner).unwrap();
        let patient = Patient::new(
            owner.id,
            "Firulais".into(),
            "Perro".into(),
            NaiveDate::from_ymd_opt(2021, 5, 20).unwrap(),
        );
        db.insert_patient(&patient).unwrap();

        for (branch, day) in [(&central, 10), (&central, 11), (&north, 12)] {
            db.insert_appointment(&Appointment::requested(
                patient.id.clone(),
                branch.id.clone(),
                NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            ))
            .unwrap();
        }

        Fixture {
            db,
            central,
            north,
            owner: AccessContext::from_principal(&owner_principal),
            patient,
            vet,
        }
    }

    fn staff(role: Role, branch: Option<&str>) -> AccessContext {
        AccessContext {
            principal_id: "staff".into(),
            role,
            branch_id: branch.map(str::to_string),
            is_superuser: false,
        }
    }

    #[test]
    fn test_branch_scoped_listing() {
        let f = fixture();
        let all = AppointmentFilter::default();

        assert_eq!(list_appointments(&f.db, &staff(Role::Admin, Some(&f.central.id)), &all).unwrap().len(), 2);
        assert_eq!(list_appointments(&f.db, &staff(Role::AdminOp, Some(&f.north.id)), &all).unwrap().len(), 1);
        assert!(list_appointments(&f.db, &staff(Role::Admin, None), &all).unwrap().is_empty());
        assert_eq!(list_appointments(&f.db, &f.owner, &all).unwrap().len(), 3);

        let mut root = staff(Role::Admin, None);
        root.is_superuser = true;
        assert_eq!(list_appointments(&f.db, &root, &all).unwrap().len(), 3);
    }

    #[test]
    fn test_owner_without_profile_sees_nothing() {
        let f = fixture();
        let fresh = Principal::new("nueva".into(), Role::Owner);
        f.db.insert_principal(&fresh).unwrap();
        let ctx = AccessContext::from_principal(&fresh);

        assert!(list_appointments(&f.db, &ctx, &AppointmentFilter::default()).unwrap().is_empty());
        assert!(search_patients(&f.db, &ctx, "", 10).unwrap().is_empty());
    }

    #[test]
    fn test_owner_filter_cannot_widen_scope() {
        let f = fixture();
        let filter = AppointmentFilter {
            owner_id: Some("someone-else".into()),
            ..Default::default()
        };
        assert_eq!(list_appointments(&f.db, &f.owner, &filter).unwrap().len(), 3);
    }

    #[test]
    fn test_directories() {
        let f = fixture();
        let central = staff(Role::Vet, Some(&f.central.id));
        let empty = Branch::new("South".into(), "C".into());
        f.db.insert_branch(&empty).unwrap();
        let south = staff(Role::Vet, Some(&empty.id));

        assert_eq!(search_patients(&f.db, &central, "Fir", 10).unwrap(), vec![f.patient.clone()]);
        assert!(search_patients(&f.db, &south, "Fir", 10).unwrap().is_empty());
        assert_eq!(search_patients(&f.db, &f.owner, "fir", 10).unwrap().len(), 1);

        assert_eq!(search_owners(&f.db, &central, "carlos", 10).unwrap().len(), 1);
        assert!(search_owners(&f.db, &south, "carlos", 10).unwrap().is_empty());
        assert!(matches!(
            search_owners(&f.db, &f.owner, "carlos", 10),
            Err(AccessError::Forbidden(_))
        ));

        assert_eq!(list_vets(&f.db, &central, &f.central.id).unwrap(), vec![f.vet.clone()]);
        assert!(list_vets(&f.db, &south, &f.central.id).unwrap().is_empty());
    }
}
