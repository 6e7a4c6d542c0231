//! Medical records: appointment linkage, ad-hoc notes and scoped reads.

mod linker;

pub use linker::*;

use chrono::NaiveDate;
use log::info;

use crate::access::{AccessContext, AccessError, AccessResult, Gate, Visibility};
use crate::db::{Database, RecordQuery};
use crate::lifecycle::{guards, Clock, LifecycleResult};
use crate::models::{ClinicalFields, DrugAdministration, MedicalRecord, Role};

/// Staff record search.
#[derive(Debug, Clone, Default)]
pub struct RecordSearch {
    pub vet_id: Option<String>,
    /// Patient name, owner name or diagnosis
    pub text: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Scoped access to medical records.
pub struct Records<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
}

impl<'a> Records<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self { db, clock }
    }

    /// A vet writes a consultation note not tied to any appointment.
    pub fn create_adhoc(
        &self,
        ctx: &AccessContext,
        patient_id: &str,
        clinical: &ClinicalFields,
    ) -> LifecycleResult<MedicalRecord> {
        ctx.require_role("write medical records", |r| *r == Role::Vet)?;
        guards::measurements(clinical)?;

        let patient = Gate::new(self.db, ctx).visible_patient(patient_id)?;
        let vet_id = (ctx.role == Role::Vet).then(|| ctx.principal_id.clone());
        let record = MedicalRecord::new(patient.id, vet_id, self.clock.now(), clinical.clone());
        self.db.insert_record(&record)?;

        info!("ad-hoc record {} written for patient {}", record.id, patient_id);
        Ok(record)
    }

    pub fn get(&self, ctx: &AccessContext, record_id: &str) -> AccessResult<MedicalRecord> {
        Gate::new(self.db, ctx).visible_record(record_id)
    }

    /// The record of an appointment, with the rule that matched it.
    pub fn for_appointment(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
    ) -> AccessResult<Option<(MedicalRecord, RecordMatch)>> {
        let appointment = Gate::new(self.db, ctx).visible_appointment(appointment_id)?;
        Ok(RecordLinker::new(self.db).lookup(&appointment)?)
    }

    /// A patient's history, newest first, limited to what the principal may see.
    pub fn list_for_patient(
        &self,
        ctx: &AccessContext,
        patient_id: &str,
    ) -> AccessResult<Vec<MedicalRecord>> {
        Gate::new(self.db, ctx).visible_patient(patient_id)?;
        let records = self.db.list_records_for_patient(patient_id)?;

        let Visibility::Branch(own) = ctx.visibility() else {
            return Ok(records);
        };
        let mut visible = Vec::with_capacity(records.len());
        for record in records {
            let keep = match &record.appointment_id {
                Some(appointment_id) => self
                    .db
                    .get_appointment(appointment_id)?
                    .map(|a| a.branch_id == own)
                    .unwrap_or(false),
                None => true,
            };
            if keep {
                visible.push(record);
            }
        }
        Ok(visible)
    }

    /// Staff search over the records visible to their branch.
    pub fn search(
        &self,
        ctx: &AccessContext,
        search: &RecordSearch,
    ) -> AccessResult<Vec<MedicalRecord>> {
        if ctx.is_owner() {
            return Err(AccessError::Forbidden(
                "owners browse records through their pets".into(),
            ));
        }

        let branch_id = match ctx.visibility() {
            Visibility::Unrestricted => None,
            Visibility::Branch(own) => Some(own),
            Visibility::Nothing => return Ok(Vec::new()),
        };

        Ok(self.db.query_records(&RecordQuery {
            branch_id,
            vet_id: search.vet_id.clone(),
            text: search.text.clone(),
            from: search.from,
            to: search.to,
        })?)
    }

    /// Drugs administered during an appointment.
    pub fn administrations(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
    ) -> AccessResult<Vec<DrugAdministration>> {
        Gate::new(self.db, ctx).visible_appointment(appointment_id)?;
        Ok(self.db.list_administrations(appointment_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{FixedClock, LifecycleError, ValidationError};
    use crate::models::{Appointment, Branch, Owner, Patient, Principal};

    struct Fixture {
        db: Database,
        clock: FixedClock,
        vet: AccessContext,
        north_vet: AccessContext,
        owner: AccessContext,
        patient: Patient,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let central = Branch::new("Central".into(), "A".into());
        let north = Branch::new("North".into(), "B".into());
        db.insert_branch(&central).unwrap();
        db.insert_branch(&north).unwrap();

        let vet = Principal::new("vera".into(), Role::Vet).in_branch(&central.id);
        let north_vet = Principal::new("nico".into(), Role::Vet).in_branch(&north.id);
        let owner_principal = Principal::new("carlos".into(), Role::Owner);
        for p in [&vet, &north_vet, &owner_principal] {
            db.insert_principal(p).unwrap();
        }
        let owner = Owner::new(owner_principal.id.clone());
        db.insert_owner(&owner).unwrap();
        let patient = Patient::new(
            owner.id,
            "Michi".into(),
            "Gato".into(),
            NaiveDate::from_ymd_opt(2020, 11, 2).unwrap(),
        );
        db.insert_patient(&patient).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        db.insert_appointment(&Appointment::requested(patient.id.clone(), central.id.clone(), date))
            .unwrap();

        Fixture {
            db,
            clock: FixedClock::new(date.and_hms_opt(11, 0, 0).unwrap()),
            vet: AccessContext::from_principal(&vet),
            north_vet: AccessContext::from_principal(&north_vet),
            owner: AccessContext::from_principal(&owner_principal),
            patient,
        }
    }

    #[test]
    fn test_adhoc_record_scoping() {
        let f = fixture();
        let records = Records::new(&f.db, &f.clock);

        let record = records
            .create_adhoc(&f.vet, &f.patient.id, &ClinicalFields::new("Dermatitis", "Baño"))
            .unwrap();
        assert_eq!(record.vet_id.as_deref(), Some(f.vet.principal_id.as_str()));
        assert!(record.appointment_id.is_none());

        assert!(records.get(&f.vet, &record.id).is_ok());
        assert!(records.get(&f.owner, &record.id).is_ok());
        assert!(matches!(
            records.get(&f.north_vet, &record.id),
            Err(AccessError::NotFound { .. })
        ));

        // Patient never seen at North
        assert!(matches!(
            records.create_adhoc(&f.north_vet, &f.patient.id, &ClinicalFields::new("x", "y")),
            Err(LifecycleError::NotFound { .. })
        ));
        assert!(matches!(
            records.create_adhoc(&f.owner, &f.patient.id, &ClinicalFields::new("x", "y")),
            Err(LifecycleError::Forbidden(_))
        ));
    }

    #[test]
    fn test_adhoc_rejects_bad_measurements() {
        let f = fixture();
        let records = Records::new(&f.db, &f.clock);
        let mut clinical = ClinicalFields::new("Fiebre", "Antipirético");
        clinical.temperature_c = Some(0.0);

        assert!(matches!(
            records.create_adhoc(&f.vet, &f.patient.id, &clinical),
            Err(LifecycleError::Validation(ValidationError::InvalidMeasurement("temperature_c")))
        ));
    }

    #[test]
    fn test_search_scoped() {
        let f = fixture();
        let records = Records::new(&f.db, &f.clock);
        records
            .create_adhoc(&f.vet, &f.patient.id, &ClinicalFields::new("Dermatitis", "Baño"))
            .unwrap();

        let search = RecordSearch {
            text: Some("derma".into()),
            ..Default::default()
        };
        assert_eq!(records.search(&f.vet, &search).unwrap().len(), 1);
        assert!(records.search(&f.north_vet, &search).unwrap().is_empty());
        assert!(matches!(
            records.search(&f.owner, &search),
            Err(AccessError::Forbidden(_))
        ));
        assert_eq!(records.list_for_patient(&f.owner, &f.patient.id).unwrap().len(), 1);
    }
}
