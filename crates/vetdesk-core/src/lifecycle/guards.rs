//! Validation guards shared by the transitions.

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use super::{Clock, LifecycleError, LifecycleResult, ValidationError};
use crate::db::Database;
use crate::models::{Appointment, ClinicalFields, Drug, DrugDose, Principal, Role};

/// Largest plausible weight (kg) or temperature (°C).
const MEASUREMENT_CEILING: f64 = 1000.0;

pub(crate) fn date_not_in_past(date: NaiveDate, clock: &dyn Clock) -> Result<(), ValidationError> {
    if date < clock.today() {
        Err(ValidationError::PastDate(date))
    } else {
        Ok(())
    }
}

pub(crate) fn time_not_in_past(at: NaiveDateTime, clock: &dyn Clock) -> Result<(), ValidationError> {
    if at < clock.now() {
        Err(ValidationError::PastDateTime(at))
    } else {
        Ok(())
    }
}

pub(crate) fn duration(minutes: u32) -> Result<u32, ValidationError> {
    if minutes == 0 {
        Err(ValidationError::InvalidDuration(minutes))
    } else {
        Ok(minutes)
    }
}

/// An active VET principal working at `branch_id`.
pub(crate) fn vet_for_branch(
    db: &Database,
    vet_id: &str,
    branch_id: &str,
) -> LifecycleResult<Principal> {
    let vet = db
        .get_principal(vet_id)
        .map_err(LifecycleError::from)?
        .ok_or_else(|| LifecycleError::NotFound {
            kind: "veterinarian",
            id: vet_id.to_string(),
        })?;

    if vet.role != Role::Vet {
        return Err(ValidationError::NotAVeterinarian(vet_id.to_string()).into());
    }
    if !vet.active {
        return Err(ValidationError::InactiveVeterinarian(vet_id.to_string()).into());
    }
    if vet.branch_id.as_deref() != Some(branch_id) {
        return Err(ValidationError::VetOutsideBranch {
            vet_id: vet_id.to_string(),
            branch_id: branch_id.to_string(),
        }
        .into());
    }

    debug!("vet {} cleared for branch {}", vet.username, branch_id);
    Ok(vet)
}

pub(crate) fn measurements(clinical: &ClinicalFields) -> Result<(), ValidationError> {
    let plausible = |value: Option<f64>| match value {
        Some(v) => v.is_finite() && v > 0.0 && v < MEASUREMENT_CEILING,
        None => true,
    };

    if !plausible(clinical.weight_kg) {
        return Err(ValidationError::InvalidMeasurement("weight_kg"));
    }
    if !plausible(clinical.temperature_c) {
        return Err(ValidationError::InvalidMeasurement("temperature_c"));
    }
    Ok(())
}

/// Resolve the drugs of an attend against the appointment's branch formulary.
pub(crate) fn doses(
    db: &Database,
    appointment: &Appointment,
    doses: &[DrugDose],
) -> LifecycleResult<Vec<Drug>> {
    let mut drugs = Vec::with_capacity(doses.len());
    for dose in doses {
        if dose.quantity == 0 {
            return Err(ValidationError::ZeroQuantity(dose.drug_id.clone()).into());
        }
        let drug = db.get_drug(&dose.drug_id)?.ok_or_else(|| LifecycleError::NotFound {
            kind: "drug",
            id: dose.drug_id.clone(),
        })?;
        if drug.branch_id != appointment.branch_id {
            return Err(ValidationError::DrugOutsideBranch {
                drug_id: drug.id,
                branch_id: appointment.branch_id.clone(),
            }
            .into());
        }
        drugs.push(drug);
    }
    Ok(drugs)
}
