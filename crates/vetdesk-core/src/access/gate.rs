//! Authorization gate: resolves ids into entities the principal may touch.
//!
//! Reads of anything outside the principal's scope report `NotFound`, the
//! same as a missing id. Mutations of an existing out-of-branch appointment
//! report `Forbidden`.

use log::{debug, warn};

use super::{AccessContext, AccessError, AccessResult, Visibility};
use crate::db::Database;
use crate::models::{Appointment, Branch, MedicalRecord, Owner, Patient};

/// Authorization gate for one acting principal.
pub struct Gate<'a> {
    db: &'a Database,
    ctx: &'a AccessContext,
}

impl<'a> Gate<'a> {
    pub fn new(db: &'a Database, ctx: &'a AccessContext) -> Self {
        Self { db, ctx }
    }

    pub fn context(&self) -> &AccessContext {
        self.ctx
    }

    /// The acting owner's profile. `None` for staff and for owners who have
    /// not completed their profile.
    pub fn owner_profile(&self) -> AccessResult<Option<Owner>> {
        if !self.ctx.is_owner() {
            return Ok(None);
        }
        Ok(self.db.get_owner_by_principal(&self.ctx.principal_id)?)
    }

    /// Branch lookup; missing branches are `NotFound`.
    pub fn branch(&self, branch_id: &str) -> AccessResult<Branch> {
        self.db
            .get_branch(branch_id)?
            .ok_or_else(|| AccessError::not_found("branch", branch_id))
    }

    /// Require that the principal may act in `branch_id`.
    pub fn require_branch(&self, branch_id: &str) -> AccessResult<()> {
        if self.ctx.visibility().covers(branch_id) {
            Ok(())
        } else {
            warn!(
                "principal {} denied access to branch {}",
                self.ctx.principal_id, branch_id
            );
            Err(AccessError::Forbidden(format!(
                "not authorized for branch {}",
                branch_id
            )))
        }
    }

    /// A patient the principal may see.
    pub fn visible_patient(&self, patient_id: &str) -> AccessResult<Patient> {
        let patient = self
            .db
            .get_patient(patient_id)?
            .ok_or_else(|| AccessError::not_found("patient", patient_id))?;

        if self.can_see_patient(&patient)? {
            Ok(patient)
        } else {
            debug!("patient {} hidden from {}", patient_id, self.ctx.principal_id);
            Err(AccessError::not_found("patient", patient_id))
        }
    }

    /// A patient belonging to the acting owner. Superusers may act for any owner.
    pub fn owned_patient(&self, patient_id: &str) -> AccessResult<Patient> {
        let patient = self
            .db
            .get_patient(patient_id)?
            .ok_or_else(|| AccessError::not_found("patient", patient_id))?;

        if self.ctx.is_superuser {
            return Ok(patient);
        }
        match self.owner_profile()? {
            Some(owner) if owner.id == patient.owner_id => Ok(patient),
            _ => Err(AccessError::not_found("patient", patient_id)),
        }
    }

    /// An appointment the principal may see.
    pub fn visible_appointment(&self, appointment_id: &str) -> AccessResult<Appointment> {
        let appointment = self
            .db
            .get_appointment(appointment_id)?
            .ok_or_else(|| AccessError::not_found("appointment", appointment_id))?;

        let visible = if self.ctx.is_owner() {
            self.owns_patient(&appointment.patient_id)?
        } else {
            self.ctx.visibility().covers(&appointment.branch_id)
        };

        if visible {
            Ok(appointment)
        } else {
            debug!(
                "appointment {} hidden from {}",
                appointment_id, self.ctx.principal_id
            );
            Err(AccessError::not_found("appointment", appointment_id))
        }
    }

    /// An appointment the principal may mutate.
    ///
    /// Must be called inside the write transaction that applies the change.
    pub fn appointment_for_mutation(&self, appointment_id: &str) -> AccessResult<Appointment> {
        let appointment = self
            .db
            .get_appointment(appointment_id)?
            .ok_or_else(|| AccessError::not_found("appointment", appointment_id))?;

        if self.ctx.is_owner() {
            if !self.owns_patient(&appointment.patient_id)? {
                return Err(AccessError::Forbidden(format!(
                    "appointment {} belongs to another owner",
                    appointment_id
                )));
            }
        } else {
            self.require_branch(&appointment.branch_id)?;
        }
        Ok(appointment)
    }

    /// A medical record the principal may see.
    pub fn visible_record(&self, record_id: &str) -> AccessResult<MedicalRecord> {
        let record = self
            .db
            .get_record(record_id)?
            .ok_or_else(|| AccessError::not_found("medical record", record_id))?;

        let visible = match (&record.appointment_id, self.ctx.visibility()) {
            _ if self.ctx.is_owner() => self.owns_patient(&record.patient_id)?,
            (_, Visibility::Unrestricted) => true,
            (_, Visibility::Nothing) => false,
            (Some(appointment_id), Visibility::Branch(own)) => self
                .db
                .get_appointment(appointment_id)?
                .map(|a| a.branch_id == own)
                .unwrap_or(false),
            (None, Visibility::Branch(own)) => {
                self.db.patient_seen_at_branch(&record.patient_id, &own)?
            }
        };

        if visible {
            Ok(record)
        } else {
            Err(AccessError::not_found("medical record", record_id))
        }
    }

    fn can_see_patient(&self, patient: &Patient) -> AccessResult<bool> {
        if self.ctx.is_owner() {
            return self.owns_patient(&patient.id);
        }
        Ok(match self.ctx.visibility() {
            Visibility::Unrestricted => true,
            Visibility::Nothing => false,
            Visibility::Branch(own) => self.db.patient_seen_at_branch(&patient.id, &own)?,
        })
    }

    fn owns_patient(&self, patient_id: &str) -> AccessResult<bool> {
        let Some(owner) = self.owner_profile()? else {
            return Ok(false);
        };
        Ok(self
            .db
            .get_patient(patient_id)?
            .map(|p| p.owner_id == owner.id)
            .unwrap_or(false))
    }
}
