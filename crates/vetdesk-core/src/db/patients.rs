//! Patient database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{like_escape, Database, DbResult};
use crate::models::Patient;

const PATIENT_COLUMNS: &str = "id, owner_id, name, species, breed, sex, birth_date, allergies";

impl Database {
    /// Insert a new patient.
    pub fn insert_patient(&self, patient: &Patient) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO patients (
                id, owner_id, name, species, breed, sex, birth_date, allergies
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                patient.id,
                patient.owner_id,
                patient.name,
                patient.species,
                patient.breed,
                patient.sex,
                patient.birth_date,
                patient.allergies,
            ],
        )?;
        Ok(())
    }

    /// Update an existing patient. The owner never changes.
    pub fn update_patient(&self, patient: &Patient) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE patients SET
                name = ?2,
                species = ?3,
                breed = ?4,
                sex = ?5,
                birth_date = ?6,
                allergies = ?7
            WHERE id = ?1
            "#,
            params![
                patient.id,
                patient.name,
                patient.species,
                patient.breed,
                patient.sex,
                patient.birth_date,
                patient.allergies,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a patient by ID.
    pub fn get_patient(&self, id: &str) -> DbResult<Option<Patient>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM patients WHERE id = ?", PATIENT_COLUMNS),
                [id],
                patient_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List an owner's patients by name.
    pub fn list_patients_for_owner(&self, owner_id: &str) -> DbResult<Vec<Patient>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM patients WHERE owner_id = ? ORDER BY name",
            PATIENT_COLUMNS
        ))?;

        let rows = stmt.query_map([owner_id], patient_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Search patients by name (prefix match), optionally limited to patients
    /// with at least one appointment at `branch_id`.
    pub fn search_patients(
        &self,
        branch_id: Option<&str>,
        query: &str,
        limit: usize,
    ) -> DbResult<Vec<Patient>> {
        let pattern = format!("{}%", like_escape(query));
        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.owner_id, p.name, p.species, p.breed, p.sex, p.birth_date, p.allergies
            FROM patients p
            WHERE p.name LIKE ?1 ESCAPE '\'
              AND (?2 IS NULL OR EXISTS (
                    SELECT 1 FROM appointments a
                    WHERE a.patient_id = p.id AND a.branch_id = ?2))
            ORDER BY p.name
            LIMIT ?3
            "#,
        )?;

        let rows = stmt.query_map(params![pattern, branch_id, limit as i64], patient_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Whether the patient has any appointment at the branch.
    pub fn patient_seen_at_branch(&self, patient_id: &str, branch_id: &str) -> DbResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE patient_id = ? AND branch_id = ?",
            [patient_id, branch_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    Ok(Patient {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        species: row.get(3)?,
        breed: row.get(4)?,
        sex: row.get(5)?,
        birth_date: row.get(6)?,
        allergies: row.get(7)?,
    })
}
