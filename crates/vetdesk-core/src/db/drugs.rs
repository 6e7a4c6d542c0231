//! Branch formulary and drug administration operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_as, Database, DbError, DbResult};
use crate::models::{Drug, DrugAdministration};

impl Database {
    /// Add a drug to a branch formulary.
    pub fn insert_drug(&self, drug: &Drug) -> DbResult<()> {
        self.conn
            .execute(
                "INSERT INTO drugs (id, name, category, description, branch_id) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![drug.id, drug.name, drug.category, drug.description, drug.branch_id],
            )
            .map_err(|e| {
                constraint_as(e, || format!("drug '{}' already listed at this branch", drug.name))
            })?;
        Ok(())
    }

    /// Get a drug by ID.
    pub fn get_drug(&self, id: &str) -> DbResult<Option<Drug>> {
        self.conn
            .query_row(
                "SELECT id, name, category, description, branch_id FROM drugs WHERE id = ?",
                [id],
                drug_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List a branch formulary by name.
    pub fn list_drugs_for_branch(&self, branch_id: &str) -> DbResult<Vec<Drug>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, description, branch_id FROM drugs WHERE branch_id = ? ORDER BY name",
        )?;

        let rows = stmt.query_map([branch_id], drug_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Remove a drug. Administered drugs are protected.
    pub fn delete_drug(&self, id: &str) -> DbResult<bool> {
        let uses: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM appointment_drugs WHERE drug_id = ?",
            [id],
            |row| row.get(0),
        )?;
        if uses > 0 {
            return Err(DbError::Constraint(format!(
                "drug {} has been administered {} time(s)",
                id, uses
            )));
        }

        let rows_affected = self.conn.execute("DELETE FROM drugs WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }

    /// Record a drug used during an appointment, replacing any earlier quantity.
    pub fn upsert_administration(&self, administration: &DrugAdministration) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO appointment_drugs (appointment_id, drug_id, quantity, recorded_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (appointment_id, drug_id)
                DO UPDATE SET quantity = excluded.quantity, recorded_at = excluded.recorded_at
                "#,
                params![
                    administration.appointment_id,
                    administration.drug_id,
                    administration.quantity,
                    administration.recorded_at,
                ],
            )
            .map_err(|e| {
                constraint_as(e, || {
                    format!("invalid administration of drug {}", administration.drug_id)
                })
            })?;
        Ok(())
    }

    /// Drugs administered during an appointment.
    pub fn list_administrations(&self, appointment_id: &str) -> DbResult<Vec<DrugAdministration>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ad.appointment_id, ad.drug_id, ad.quantity, ad.recorded_at
            FROM appointment_drugs ad
            JOIN drugs d ON d.id = ad.drug_id
            WHERE ad.appointment_id = ?
            ORDER BY d.name
            "#,
        )?;

        let rows = stmt.query_map([appointment_id], |row| {
            Ok(DrugAdministration {
                appointment_id: row.get(0)?,
                drug_id: row.get(1)?,
                quantity: row.get(2)?,
                recorded_at: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn drug_from_row(row: &Row<'_>) -> rusqlite::Result<Drug> {
    Ok(Drug {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        branch_id: row.get(4)?,
    })
}
