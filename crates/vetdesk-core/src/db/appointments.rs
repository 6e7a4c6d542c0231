//! Appointment database operations.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{like_escape, Database, DbError, DbResult};
use crate::models::{Appointment, AppointmentKind, AppointmentState};

const APPOINTMENT_COLUMNS: &str = "a.id, a.patient_id, a.branch_id, a.vet_id, a.requested_date, \
     a.confirmed_at, a.state, a.kind, a.duration_minutes, a.notes, a.created_at, a.updated_at";

/// Confirmed appointments first by confirmed time, then the rest by requested date.
const APPOINTMENT_ORDER: &str =
    "ORDER BY a.confirmed_at IS NULL, a.confirmed_at, a.requested_date, a.created_at, a.id";

/// Filters for appointment listings. Every set field narrows the result.
#[derive(Debug, Clone, Default)]
pub struct AppointmentQuery {
    /// Only appointments at this branch
    pub branch_id: Option<String>,
    /// Only appointments for this owner's patients
    pub owner_id: Option<String>,
    /// Only this patient
    pub patient_id: Option<String>,
    pub state: Option<AppointmentState>,
    pub vet_id: Option<String>,
    /// Effective date lower bound (inclusive)
    pub from: Option<NaiveDate>,
    /// Effective date upper bound (inclusive)
    pub to: Option<NaiveDate>,
    /// Case-insensitive match on patient name, owner name or notes
    pub text: Option<String>,
    pub limit: Option<usize>,
}

impl Database {
    /// Insert a new appointment.
    pub fn insert_appointment(&self, appointment: &Appointment) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO appointments (
                id, patient_id, branch_id, vet_id, requested_date, confirmed_at,
                state, kind, duration_minutes, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
            params![
                appointment.id,
                appointment.patient_id,
                appointment.branch_id,
                appointment.vet_id,
                appointment.requested_date,
                appointment.confirmed_at,
                appointment.state.as_str(),
                appointment.kind.as_str(),
                appointment.duration_minutes,
                appointment.notes,
                appointment.created_at,
                appointment.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Write the mutable lifecycle fields of an appointment.
    pub fn update_appointment(&self, appointment: &Appointment) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE appointments SET
                vet_id = ?2,
                requested_date = ?3,
                confirmed_at = ?4,
                state = ?5,
                notes = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
            params![
                appointment.id,
                appointment.vet_id,
                appointment.requested_date,
                appointment.confirmed_at,
                appointment.state.as_str(),
                appointment.notes,
                appointment.updated_at,
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// Get an appointment by ID.
    pub fn get_appointment(&self, id: &str) -> DbResult<Option<Appointment>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM appointments a WHERE a.id = ?", APPOINTMENT_COLUMNS),
                [id],
                appointment_row,
            )
            .optional()?
            .map(|row| row.try_into())
            .transpose()
    }

    /// List every appointment, in listing order.
    pub fn list_appointments(&self) -> DbResult<Vec<Appointment>> {
        self.query_appointments(&AppointmentQuery::default())
    }

    /// List appointments matching a query, in listing order.
    pub fn query_appointments(&self, query: &AppointmentQuery) -> DbResult<Vec<Appointment>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(branch_id) = &query.branch_id {
            clauses.push("a.branch_id = ?");
            values.push(Value::Text(branch_id.clone()));
        }
        if let Some(owner_id) = &query.owner_id {
            clauses.push("p.owner_id = ?");
            values.push(Value::Text(owner_id.clone()));
        }
        if let Some(patient_id) = &query.patient_id {
            clauses.push("a.patient_id = ?");
            values.push(Value::Text(patient_id.clone()));
        }
        if let Some(state) = query.state {
            clauses.push("a.state = ?");
            values.push(Value::Text(state.as_str().to_string()));
        }
        if let Some(vet_id) = &query.vet_id {
            clauses.push("a.vet_id = ?");
            values.push(Value::Text(vet_id.clone()));
        }
        if let Some(from) = query.from {
            clauses.push("date(COALESCE(a.confirmed_at, a.requested_date)) >= ?");
            values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = query.to {
            clauses.push("date(COALESCE(a.confirmed_at, a.requested_date)) <= ?");
            values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            clauses.push(
                "(p.name LIKE ? ESCAPE '\\' OR u.display_name LIKE ? ESCAPE '\\' \
                 OR a.notes LIKE ? ESCAPE '\\')",
            );
            let pattern = format!("%{}%", like_escape(text));
            for _ in 0..3 {
                values.push(Value::Text(pattern.clone()));
            }
        }

        let mut sql = format!(
            r#"
            SELECT {}
            FROM appointments a
            JOIN patients p ON p.id = a.patient_id
            JOIN owners o ON o.id = p.owner_id
            JOIN principals u ON u.id = o.principal_id
            "#,
            APPOINTMENT_COLUMNS
        );
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push(' ');
        sql.push_str(APPOINTMENT_ORDER);
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(Value::Integer(limit as i64));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), appointment_row)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row?.try_into()?);
        }
        Ok(appointments)
    }
}

/// Intermediate row struct for database mapping.
struct AppointmentRow {
    id: String,
    patient_id: String,
    branch_id: String,
    vet_id: Option<String>,
    requested_date: NaiveDate,
    confirmed_at: Option<NaiveDateTime>,
    state: String,
    kind: String,
    duration_minutes: u32,
    notes: String,
    created_at: String,
    updated_at: String,
}

fn appointment_row(row: &Row<'_>) -> rusqlite::Result<AppointmentRow> {
    Ok(AppointmentRow {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        branch_id: row.get(2)?,
        vet_id: row.get(3)?,
        requested_date: row.get(4)?,
        confirmed_at: row.get(5)?,
        state: row.get(6)?,
        kind: row.get(7)?,
        duration_minutes: row.get(8)?,
        notes: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = DbError;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        let state = AppointmentState::parse(&row.state)
            .ok_or_else(|| DbError::Constraint(format!("Unknown appointment state: {}", row.state)))?;
        let kind = AppointmentKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown appointment kind: {}", row.kind)))?;

        Ok(Appointment {
            id: row.id,
            patient_id: row.patient_id,
            branch_id: row.branch_id,
            vet_id: row.vet_id,
            requested_date: row.requested_date,
            confirmed_at: row.confirmed_at,
            state,
            kind,
            duration_minutes: row.duration_minutes,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, Owner, Patient, Principal, Role};

    struct Fixture {
        db: Database,
        branch: Branch,
        vet: Principal,
        patient: Patient,
    }

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Central".into(), "A".into());
        db.insert_branch(&branch).unwrap();
        let vet = Principal::new("drperro".into(), Role::Vet).in_branch(&branch.id);
        db.insert_principal(&vet).unwrap();
        let mut owner_principal = Principal::new("lola".into(), Role::Owner);
        owner_principal.display_name = "Lola Gomez".into();
        db.insert_principal(&owner_principal).unwrap();
        let owner = Owner::new(owner_principal.id);
        db.insert_owner(&owner).unwrap();
        let patient = Patient::new(owner.id, "Firulais".into(), "Perro".into(), date(1, 1));
        db.insert_patient(&patient).unwrap();
        Fixture { db, branch, vet, patient }
    }

    #[test]
    fn test_insert_and_get() {
        let f = setup();
        let mut appt = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 10));
        appt.notes = "Control de rutina".into();
        f.db.insert_appointment(&appt).unwrap();

        let retrieved = f.db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved, appt);
    }

    #[test]
    fn test_update_lifecycle_fields() {
        let f = setup();
        let mut appt = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 10));
        f.db.insert_appointment(&appt).unwrap();

        let at = date(3, 12).and_hms_opt(10, 0, 0).unwrap();
        appt.vet_id = Some(f.vet.id.clone());
        appt.confirmed_at = Some(at);
        appt.requested_date = at.date();
        appt.state = AppointmentState::Scheduled;
        assert!(f.db.update_appointment(&appt).unwrap());

        let retrieved = f.db.get_appointment(&appt.id).unwrap().unwrap();
        assert_eq!(retrieved.state, AppointmentState::Scheduled);
        assert_eq!(retrieved.confirmed_at, Some(at));
        assert_eq!(retrieved.vet_id.as_deref(), Some(f.vet.id.as_str()));
    }

    #[test]
    fn test_invalid_state_combination_rejected() {
        let f = setup();
        let mut appt = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 10));
        f.db.insert_appointment(&appt).unwrap();

        // Scheduled without confirmed time violates the CHECK constraint
        appt.state = AppointmentState::Scheduled;
        assert!(f.db.update_appointment(&appt).is_err());
    }

    #[test]
    fn test_listing_order_confirmed_first() {
        let f = setup();
        let late_request =
            Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 20));
        let early_request =
            Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 5));
        let confirmed = Appointment::scheduled(
            f.patient.id.clone(),
            f.branch.id.clone(),
            f.vet.id.clone(),
            date(3, 25).and_hms_opt(9, 0, 0).unwrap(),
        );
        f.db.insert_appointment(&late_request).unwrap();
        f.db.insert_appointment(&early_request).unwrap();
        f.db.insert_appointment(&confirmed).unwrap();

        let ids: Vec<String> = f.db.list_appointments().unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![confirmed.id, early_request.id, late_request.id]);
    }

    #[test]
    fn test_query_filters() {
        let f = setup();
        let mut a1 = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 10));
        a1.notes = "Vacuna antirrábica".into();
        let a2 = Appointment::scheduled(
            f.patient.id.clone(),
            f.branch.id.clone(),
            f.vet.id.clone(),
            date(4, 2).and_hms_opt(15, 30, 0).unwrap(),
        );
        f.db.insert_appointment(&a1).unwrap();
        f.db.insert_appointment(&a2).unwrap();

        let by_state = f
            .db
            .query_appointments(&AppointmentQuery {
                state: Some(AppointmentState::Scheduled),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_state.len(), 1);
        assert_eq!(by_state[0].id, a2.id);

        let by_range = f
            .db
            .query_appointments(&AppointmentQuery {
                from: Some(date(3, 1)),
                to: Some(date(3, 31)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_range.len(), 1);
        assert_eq!(by_range[0].id, a1.id);

        let by_text = f
            .db
            .query_appointments(&AppointmentQuery {
                text: Some("antirr".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_text.len(), 1);

        let by_owner_name = f
            .db
            .query_appointments(&AppointmentQuery {
                text: Some("lola".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_owner_name.len(), 2);

        let limited = f
            .db
            .query_appointments(&AppointmentQuery {
                limit: Some(1),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_text_filter_treats_wildcards_literally() {
        let f = setup();
        let mut discounted = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 10));
        discounted.notes = "Descuento 50% en control".into();
        let plain = Appointment::requested(f.patient.id.clone(), f.branch.id.clone(), date(3, 11));
        f.db.insert_appointment(&discounted).unwrap();
        f.db.insert_appointment(&plain).unwrap();

        let search = |text: &str| {
            f.db.query_appointments(&AppointmentQuery {
                text: Some(text.into()),
                ..Default::default()
            })
            .unwrap()
        };

        let percent = search("%");
        assert_eq!(percent.len(), 1);
        assert_eq!(percent[0].id, discounted.id);
        assert!(search("_").is_empty());
    }
}
