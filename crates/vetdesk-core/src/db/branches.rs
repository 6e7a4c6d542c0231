//! Branch database operations.

use rusqlite::OptionalExtension;

use super::{constraint_as, Database, DbError, DbResult};
use crate::models::Branch;

impl Database {
    /// Insert a new branch. Names are unique.
    pub fn insert_branch(&self, branch: &Branch) -> DbResult<()> {
        self.conn
            .execute(
                "INSERT INTO branches (id, name, address, phone) VALUES (?1, ?2, ?3, ?4)",
                [&branch.id, &branch.name, &branch.address, &branch.phone],
            )
            .map_err(|e| constraint_as(e, || format!("branch name already taken: {}", branch.name)))?;
        Ok(())
    }

    /// Get a branch by ID.
    pub fn get_branch(&self, id: &str) -> DbResult<Option<Branch>> {
        self.conn
            .query_row(
                "SELECT id, name, address, phone FROM branches WHERE id = ?",
                [id],
                |row| {
                    Ok(Branch {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        address: row.get(2)?,
                        phone: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
    }

    /// List all branches by name.
    pub fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, address, phone FROM branches ORDER BY name")?;

        let rows = stmt.query_map([], |row| {
            Ok(Branch {
                id: row.get(0)?,
                name: row.get(1)?,
                address: row.get(2)?,
                phone: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Delete a branch. Blocked while any appointment or drug references it.
    pub fn delete_branch(&self, id: &str) -> DbResult<bool> {
        let references: i64 = self.conn.query_row(
            r#"
            SELECT (SELECT COUNT(*) FROM appointments WHERE branch_id = ?1)
                 + (SELECT COUNT(*) FROM drugs WHERE branch_id = ?1)
            "#,
            [id],
            |row| row.get(0),
        )?;
        if references > 0 {
            return Err(DbError::Constraint(format!(
                "branch {} is referenced by {} appointment(s) or drug(s)",
                id, references
            )));
        }

        let rows_affected = self.conn.execute("DELETE FROM branches WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}
