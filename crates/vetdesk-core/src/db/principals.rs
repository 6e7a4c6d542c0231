//! Principal and owner profile database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{constraint_as, like_escape, Database, DbError, DbResult};
use crate::models::{Owner, Principal, Role};

const PRINCIPAL_COLUMNS: &str =
    "id, username, display_name, role, branch_id, active, superuser, specialty";

const OWNER_COLUMNS: &str = "id, principal_id, phone, address, city, notes";

impl Database {
    /// Insert a new principal.
    pub fn insert_principal(&self, principal: &Principal) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO principals (
                    id, username, display_name, role, branch_id, active, superuser, specialty
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    principal.id,
                    principal.username,
                    principal.display_name,
                    principal.role.as_str(),
                    principal.branch_id,
                    principal.active,
                    principal.superuser,
                    principal.specialty,
                ],
            )
            .map_err(|e| constraint_as(e, || format!("username already taken: {}", principal.username)))?;
        Ok(())
    }

    /// Update role, branch, flags and names of an existing principal.
    pub fn update_principal(&self, principal: &Principal) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE principals SET
                username = ?2,
                display_name = ?3,
                role = ?4,
                branch_id = ?5,
                active = ?6,
                superuser = ?7,
                specialty = ?8
            WHERE id = ?1
            "#,
            params![
                principal.id,
                principal.username,
                principal.display_name,
                principal.role.as_str(),
                principal.branch_id,
                principal.active,
                principal.superuser,
                principal.specialty,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get a principal by ID.
    pub fn get_principal(&self, id: &str) -> DbResult<Option<Principal>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM principals WHERE id = ?", PRINCIPAL_COLUMNS),
                [id],
                principal_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List veterinarians affiliated with a branch, by name.
    pub fn list_vets_in_branch(&self, branch_id: &str) -> DbResult<Vec<Principal>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM principals WHERE role = 'VET' AND branch_id = ? ORDER BY display_name",
            PRINCIPAL_COLUMNS
        ))?;

        let rows = stmt.query_map([branch_id], principal_row)?;

        let mut principals = Vec::new();
        for row in rows {
            principals.push(row?.try_into()?);
        }
        Ok(principals)
    }

    /// Insert an owner profile for an OWNER principal.
    pub fn insert_owner(&self, owner: &Owner) -> DbResult<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO owners (id, principal_id, phone, address, city, notes)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    owner.id,
                    owner.principal_id,
                    owner.phone,
                    owner.address,
                    owner.city,
                    owner.notes,
                ],
            )
            .map_err(|e| {
                constraint_as(e, || {
                    format!("principal {} already has an owner profile", owner.principal_id)
                })
            })?;
        Ok(())
    }

    /// Get an owner profile by ID.
    pub fn get_owner(&self, id: &str) -> DbResult<Option<Owner>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM owners WHERE id = ?", OWNER_COLUMNS),
                [id],
                owner_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Get the owner profile of a principal. `None` while the profile is incomplete.
    pub fn get_owner_by_principal(&self, principal_id: &str) -> DbResult<Option<Owner>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM owners WHERE principal_id = ?", OWNER_COLUMNS),
                [principal_id],
                owner_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Search owners by principal name, optionally limited to owners with a
    /// patient seen at `branch_id`.
    pub fn search_owners(
        &self,
        branch_id: Option<&str>,
        query: &str,
        limit: usize,
    ) -> DbResult<Vec<Owner>> {
        let pattern = format!("%{}%", like_escape(query));
        let mut stmt = self.conn.prepare(
            r#"
            SELECT o.id, o.principal_id, o.phone, o.address, o.city, o.notes
            FROM owners o
            JOIN principals u ON u.id = o.principal_id
            WHERE (u.display_name LIKE ?1 ESCAPE '\' OR u.username LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR EXISTS (
                    SELECT 1 FROM patients p
                    JOIN appointments a ON a.patient_id = p.id
                    WHERE p.owner_id = o.id AND a.branch_id = ?2))
            ORDER BY u.display_name
            LIMIT ?3
            "#,
        )?;

        let rows = stmt.query_map(params![pattern, branch_id, limit as i64], owner_from_row)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

/// Intermediate row struct for database mapping.
struct PrincipalRow {
    id: String,
    username: String,
    display_name: String,
    role: String,
    branch_id: Option<String>,
    active: bool,
    superuser: bool,
    specialty: Option<String>,
}

fn principal_row(row: &Row<'_>) -> rusqlite::Result<PrincipalRow> {
    Ok(PrincipalRow {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        role: row.get(3)?,
        branch_id: row.get(4)?,
        active: row.get(5)?,
        superuser: row.get(6)?,
        specialty: row.get(7)?,
    })
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = DbError;

    fn try_from(row: PrincipalRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| DbError::Constraint(format!("Unknown role: {}", row.role)))?;

        Ok(Principal {
            id: row.id,
            username: row.username,
            display_name: row.display_name,
            role,
            branch_id: row.branch_id,
            active: row.active,
            superuser: row.superuser,
            specialty: row.specialty,
        })
    }
}

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: row.get(0)?,
        principal_id: row.get(1)?,
        phone: row.get(2)?,
        address: row.get(3)?,
        city: row.get(4)?,
        notes: row.get(5)?,
    })
}
