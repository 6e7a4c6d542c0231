//! Medical record database operations.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_as, like_escape, Database, DbResult};
use crate::models::{ClinicalFields, MedicalRecord};

const RECORD_COLUMNS: &str = "r.id, r.patient_id, r.vet_id, r.appointment_id, r.recorded_at, \
     r.diagnosis, r.treatment, r.notes, r.weight_kg, r.temperature_c, r.exams, r.image_path, \
     r.follow_up, r.updated_at";

/// Filters for staff record searches.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Only records visible to this branch
    pub branch_id: Option<String>,
    /// Only records written by this vet
    pub vet_id: Option<String>,
    /// Match on patient name, owner name or diagnosis
    pub text: Option<String>,
    /// Recorded on or after
    pub from: Option<NaiveDate>,
    /// Recorded on or before
    pub to: Option<NaiveDate>,
}

impl Database {
    /// Insert a new medical record.
    pub fn insert_record(&self, record: &MedicalRecord) -> DbResult<()> {
        let clinical = &record.clinical;
        self.conn
            .execute(
                r#"
                INSERT INTO medical_records (
                    id, patient_id, vet_id, appointment_id, recorded_at,
                    diagnosis, treatment, notes, weight_kg, temperature_c,
                    exams, image_path, follow_up, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    record.id,
                    record.patient_id,
                    record.vet_id,
                    record.appointment_id,
                    record.recorded_at,
                    clinical.diagnosis,
                    clinical.treatment,
                    clinical.notes,
                    clinical.weight_kg,
                    clinical.temperature_c,
                    clinical.exams,
                    clinical.image_path,
                    clinical.follow_up,
                    record.updated_at,
                ],
            )
            .map_err(|e| {
                constraint_as(e, || {
                    format!(
                        "appointment {} already has a medical record",
                        record.appointment_id.as_deref().unwrap_or("-")
                    )
                })
            })?;
        Ok(())
    }

    /// Overwrite the clinical fields of a record in place.
    pub fn update_record_clinical(
        &self,
        id: &str,
        vet_id: Option<&str>,
        clinical: &ClinicalFields,
    ) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE medical_records SET
                vet_id = ?2,
                diagnosis = ?3,
                treatment = ?4,
                notes = ?5,
                weight_kg = ?6,
                temperature_c = ?7,
                exams = ?8,
                image_path = ?9,
                follow_up = ?10,
                updated_at = ?11
            WHERE id = ?1
            "#,
            params![
                id,
                vet_id,
                clinical.diagnosis,
                clinical.treatment,
                clinical.notes,
                clinical.weight_kg,
                clinical.temperature_c,
                clinical.exams,
                clinical.image_path,
                clinical.follow_up,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a record by ID.
    pub fn get_record(&self, id: &str) -> DbResult<Option<MedicalRecord>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM medical_records r WHERE r.id = ?", RECORD_COLUMNS),
                [id],
                record_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the record linked to an appointment.
    pub fn get_record_for_appointment(&self, appointment_id: &str) -> DbResult<Option<MedicalRecord>> {
        self.conn
            .query_row(
                &format!(
                    "SELECT {} FROM medical_records r WHERE r.appointment_id = ?",
                    RECORD_COLUMNS
                ),
                [appointment_id],
                record_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Latest unlinked record of a patient written on `day`.
    pub fn find_unlinked_record_on(
        &self,
        patient_id: &str,
        day: NaiveDate,
    ) -> DbResult<Option<MedicalRecord>> {
        self.conn
            .query_row(
                &format!(
                    r#"
                    SELECT {} FROM medical_records r
                    WHERE r.patient_id = ?1
                      AND r.appointment_id IS NULL
                      AND date(r.recorded_at) = ?2
                    ORDER BY r.recorded_at DESC
                    LIMIT 1
                    "#,
                    RECORD_COLUMNS
                ),
                params![patient_id, day],
                record_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List a patient's records, newest first.
    pub fn list_records_for_patient(&self, patient_id: &str) -> DbResult<Vec<MedicalRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM medical_records r WHERE r.patient_id = ? ORDER BY r.recorded_at DESC",
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map([patient_id], record_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Search records, newest first.
    ///
    /// With a branch set, a linked record is visible when its appointment is
    /// at the branch; an unlinked one when its patient was seen there.
    pub fn query_records(&self, query: &RecordQuery) -> DbResult<Vec<MedicalRecord>> {
        let pattern = query
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", like_escape(t)));

        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM medical_records r
            JOIN patients p ON p.id = r.patient_id
            JOIN owners o ON o.id = p.owner_id
            JOIN principals u ON u.id = o.principal_id
            WHERE (?1 IS NULL OR
                   (r.appointment_id IS NOT NULL AND EXISTS (
                        SELECT 1 FROM appointments a
                        WHERE a.id = r.appointment_id AND a.branch_id = ?1))
                   OR
                   (r.appointment_id IS NULL AND EXISTS (
                        SELECT 1 FROM appointments a
                        WHERE a.patient_id = r.patient_id AND a.branch_id = ?1)))
              AND (?2 IS NULL OR r.vet_id = ?2)
              AND (?3 IS NULL
                   OR p.name LIKE ?3 ESCAPE '\'
                   OR u.display_name LIKE ?3 ESCAPE '\'
                   OR r.diagnosis LIKE ?3 ESCAPE '\')
              AND (?4 IS NULL OR date(r.recorded_at) >= ?4)
              AND (?5 IS NULL OR date(r.recorded_at) <= ?5)
            ORDER BY r.recorded_at DESC
            "#,
            RECORD_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![query.branch_id, query.vet_id, pattern, query.from, query.to],
            record_from_row,
        )?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<MedicalRecord> {
    let recorded_at: NaiveDateTime = row.get(4)?;
    Ok(MedicalRecord {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        vet_id: row.get(2)?,
        appointment_id: row.get(3)?,
        recorded_at,
        clinical: ClinicalFields {
            diagnosis: row.get(5)?,
            treatment: row.get(6)?,
            notes: row.get(7)?,
            weight_kg: row.get(8)?,
            temperature_c: row.get(9)?,
            exams: row.get(10)?,
            image_path: row.get(11)?,
            follow_up: row.get(12)?,
        },
        updated_at: row.get(13)?,
    })
}
