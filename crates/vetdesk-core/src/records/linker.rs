//! Appointment to medical record linkage.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::{Database, DbError, DbResult};
use crate::models::{Appointment, ClinicalFields, MedicalRecord};

/// Whether an upsert created the record or overwrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOutcome {
    Created,
    Updated,
}

impl LinkOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkOutcome::Created => "created",
            LinkOutcome::Updated => "updated",
        }
    }
}

/// Which rule found a record for an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordMatch {
    /// Linked by appointment id
    Linked,
    /// Unlinked record of the same patient on the appointment's date
    LegacyDate,
}

impl RecordMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordMatch::Linked => "linked",
            RecordMatch::LegacyDate => "legacy_date",
        }
    }
}

#[derive(Debug, Clone)]
pub struct LinkedRecord {
    pub record: MedicalRecord,
    pub outcome: LinkOutcome,
}

/// Keeps one medical record per appointment.
pub struct RecordLinker<'a> {
    db: &'a Database,
}

impl<'a> RecordLinker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Create the appointment's record, or overwrite its clinical fields in
    /// place. Keyed only by the appointment id.
    pub fn upsert(
        &self,
        appointment: &Appointment,
        vet_id: Option<&str>,
        clinical: &ClinicalFields,
        now: NaiveDateTime,
    ) -> DbResult<LinkedRecord> {
        if let Some(existing) = self.db.get_record_for_appointment(&appointment.id)? {
            self.db.update_record_clinical(&existing.id, vet_id, clinical)?;
            let record = self
                .db
                .get_record(&existing.id)?
                .ok_or_else(|| DbError::NotFound(existing.id.clone()))?;
            return Ok(LinkedRecord {
                record,
                outcome: LinkOutcome::Updated,
            });
        }

        let mut record = MedicalRecord::new(
            appointment.patient_id.clone(),
            vet_id.map(str::to_string),
            now,
            clinical.clone(),
        );
        record.appointment_id = Some(appointment.id.clone());
        self.db.insert_record(&record)?;
        Ok(LinkedRecord {
            record,
            outcome: LinkOutcome::Created,
        })
    }

    /// Find the record for an appointment, falling back to an unlinked
    /// record written on the appointment's date.
    pub fn lookup(&self, appointment: &Appointment) -> DbResult<Option<(MedicalRecord, RecordMatch)>> {
        if let Some(record) = self.db.get_record_for_appointment(&appointment.id)? {
            return Ok(Some((record, RecordMatch::Linked)));
        }
        Ok(self
            .db
            .find_unlinked_record_on(&appointment.patient_id, appointment.effective_date())?
            .map(|record| (record, RecordMatch::LegacyDate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, Owner, Patient, Principal, Role};
    use chrono::NaiveDate;

    fn setup() -> (Database, Appointment) {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Central".into(), "A".into());
        db.insert_branch(&branch).unwrap();
        let principal = Principal::new("carlos".into(), Role::Owner);
        db.insert_principal(&principal).unwrap();
        let owner = Owner::new(principal.id);
        db.insert_owner(&owner).unwrap();
        let patient = Patient::new(
            owner.id,
            "Firulais".into(),
            "Perro".into(),
            NaiveDate::from_ymd_opt(2021, 5, 20).unwrap(),
        );
        db.insert_patient(&patient).unwrap();
        let appt = Appointment::requested(
            patient.id,
            branch.id,
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        );
        db.insert_appointment(&appt).unwrap();
        (db, appt)
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_upsert_keeps_identity() {
        let (db, appt) = setup();
        let linker = RecordLinker::new(&db);

        let first = linker
            .upsert(&appt, None, &ClinicalFields::new("Otitis", "Drops x7d"), noon())
            .unwrap();
        assert_eq!(first.outcome, LinkOutcome::Created);

        let second = linker
            .upsert(&appt, None, &ClinicalFields::new("Otitis externa", "Drops x10d"), noon())
            .unwrap();
        assert_eq!(second.outcome, LinkOutcome::Updated);
        assert_eq!(second.record.id, first.record.id);
        assert_eq!(second.record.clinical.diagnosis, "Otitis externa");
        assert_eq!(db.list_records_for_patient(&appt.patient_id).unwrap().len(), 1);
    }

    #[test]
    fn test_lookup_prefers_link_over_date() {
        let (db, appt) = setup();
        let linker = RecordLinker::new(&db);

        assert!(linker.lookup(&appt).unwrap().is_none());

        let legacy = MedicalRecord::new(
            appt.patient_id.clone(),
            None,
            noon(),
            ClinicalFields::new("Control", "-"),
        );
        db.insert_record(&legacy).unwrap();
        let (found, rule) = linker.lookup(&appt).unwrap().unwrap();
        assert_eq!(found.id, legacy.id);
        assert_eq!(rule, RecordMatch::LegacyDate);

        // Linkage never adopts the legacy record
        let linked = linker
            .upsert(&appt, None, &ClinicalFields::new("Otitis", "Drops"), noon())
            .unwrap();
        assert_eq!(linked.outcome, LinkOutcome::Created);
        assert_ne!(linked.record.id, legacy.id);

        let (found, rule) = linker.lookup(&appt).unwrap().unwrap();
        assert_eq!(found.id, linked.record.id);
        assert_eq!(rule, RecordMatch::Linked);
    }
}
