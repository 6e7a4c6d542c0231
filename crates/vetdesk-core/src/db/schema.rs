//! SQLite schema definition.

/// Complete database schema for vetdesk.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Branches
-- ============================================================================

CREATE TABLE IF NOT EXISTS branches (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    address TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Principals and owner profiles
-- ============================================================================

CREATE TABLE IF NOT EXISTS principals (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('ADMIN', 'VET', 'ADMIN_OP', 'OWNER')),
    branch_id TEXT REFERENCES branches(id) ON DELETE SET NULL,
    active INTEGER NOT NULL DEFAULT 1,
    superuser INTEGER NOT NULL DEFAULT 0,
    specialty TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_principals_branch_role ON principals(branch_id, role);

CREATE TABLE IF NOT EXISTS owners (
    id TEXT PRIMARY KEY,
    principal_id TEXT NOT NULL UNIQUE REFERENCES principals(id) ON DELETE CASCADE,
    phone TEXT NOT NULL DEFAULT '',
    address TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT ''
);

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL REFERENCES owners(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    species TEXT NOT NULL,
    breed TEXT NOT NULL DEFAULT '',
    sex TEXT NOT NULL DEFAULT '',
    birth_date TEXT NOT NULL,
    allergies TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_patients_owner ON patients(owner_id);
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Appointments
-- ============================================================================

CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    branch_id TEXT NOT NULL REFERENCES branches(id) ON DELETE RESTRICT,
    vet_id TEXT REFERENCES principals(id) ON DELETE SET NULL,
    requested_date TEXT NOT NULL,                -- YYYY-MM-DD
    confirmed_at TEXT,                           -- YYYY-MM-DD HH:MM:SS, set on scheduling
    state TEXT NOT NULL DEFAULT 'requested'
        CHECK (state IN ('requested', 'scheduled', 'attended', 'cancelled')),
    kind TEXT NOT NULL DEFAULT 'consultation'
        CHECK (kind IN ('consultation', 'vaccination', 'surgery')),
    duration_minutes INTEGER NOT NULL DEFAULT 30 CHECK (duration_minutes > 0),
    notes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    -- A requested appointment carries neither vet nor confirmed time
    CHECK (state <> 'requested' OR (vet_id IS NULL AND confirmed_at IS NULL)),
    -- Scheduled and attended appointments always have a confirmed time
    CHECK (state NOT IN ('scheduled', 'attended') OR confirmed_at IS NOT NULL)
);

CREATE INDEX IF NOT EXISTS idx_appointments_branch_state ON appointments(branch_id, state);
CREATE INDEX IF NOT EXISTS idx_appointments_vet ON appointments(vet_id);
CREATE INDEX IF NOT EXISTS idx_appointments_patient ON appointments(patient_id);

-- Assigned vet must work at the appointment's branch
CREATE TRIGGER IF NOT EXISTS appointments_vet_branch_insert BEFORE INSERT ON appointments
WHEN new.vet_id IS NOT NULL
BEGIN
    SELECT CASE
        WHEN (SELECT branch_id FROM principals WHERE id = new.vet_id) IS NOT new.branch_id THEN
            RAISE(ABORT, 'Veterinarian does not belong to the appointment branch')
    END;
END;

CREATE TRIGGER IF NOT EXISTS appointments_vet_branch_update BEFORE UPDATE OF vet_id, branch_id ON appointments
WHEN new.vet_id IS NOT NULL AND new.vet_id IS NOT old.vet_id
BEGIN
    SELECT CASE
        WHEN (SELECT branch_id FROM principals WHERE id = new.vet_id) IS NOT new.branch_id THEN
            RAISE(ABORT, 'Veterinarian does not belong to the appointment branch')
    END;
END;

-- Appointments are cancelled, never deleted
CREATE TRIGGER IF NOT EXISTS appointments_no_delete BEFORE DELETE ON appointments
BEGIN
    SELECT RAISE(ABORT, 'Appointments cannot be deleted');
END;

-- ============================================================================
-- Medical Records
-- ============================================================================

CREATE TABLE IF NOT EXISTS medical_records (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    vet_id TEXT REFERENCES principals(id) ON DELETE SET NULL,
    appointment_id TEXT UNIQUE REFERENCES appointments(id) ON DELETE CASCADE,  -- NULL for ad-hoc notes
    recorded_at TEXT NOT NULL,
    diagnosis TEXT NOT NULL,
    treatment TEXT NOT NULL,
    notes TEXT NOT NULL DEFAULT '',
    weight_kg REAL,
    temperature_c REAL,
    exams TEXT NOT NULL DEFAULT '',
    image_path TEXT,
    follow_up TEXT,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_records_patient ON medical_records(patient_id, recorded_at);

-- Once linked, a record never moves to another appointment
CREATE TRIGGER IF NOT EXISTS medical_records_link_fixed BEFORE UPDATE OF appointment_id ON medical_records
WHEN old.appointment_id IS NOT NULL AND new.appointment_id IS NOT old.appointment_id
BEGIN
    SELECT RAISE(ABORT, 'Medical record is already linked to an appointment');
END;

-- ============================================================================
-- Formulary and drug administrations
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    branch_id TEXT NOT NULL REFERENCES branches(id) ON DELETE RESTRICT,
    UNIQUE (branch_id, name)
);

CREATE TABLE IF NOT EXISTS appointment_drugs (
    appointment_id TEXT NOT NULL REFERENCES appointments(id) ON DELETE CASCADE,
    drug_id TEXT NOT NULL REFERENCES drugs(id) ON DELETE RESTRICT,
    quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity > 0),
    recorded_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (appointment_id, drug_id)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO branches (id, name) VALUES ('b1', 'Central'), ('b2', 'North');
            INSERT INTO principals (id, username, display_name, role, branch_id)
                VALUES ('v1', 'vet1', 'Vet One', 'VET', 'b1'),
                       ('o1', 'owner1', 'Owner One', 'OWNER', NULL);
            INSERT INTO owners (id, principal_id) VALUES ('ow1', 'o1');
            INSERT INTO patients (id, owner_id, name, species, birth_date)
                VALUES ('p1', 'ow1', 'Firulais', 'Perro', '2021-05-20');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
        // Applying twice is harmless
        assert!(conn.execute_batch(SCHEMA).is_ok());
    }

    #[test]
    fn test_requested_state_constraint() {
        let conn = seeded();

        // Requested with a confirmed time should fail
        let result = conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, requested_date, confirmed_at, state)
             VALUES ('a1', 'p1', 'b1', '2025-03-10', '2025-03-10 10:00:00', 'requested')",
            [],
        );
        assert!(result.is_err());

        // Scheduled without a confirmed time should fail
        let result = conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, vet_id, requested_date, state)
             VALUES ('a1', 'p1', 'b1', 'v1', '2025-03-10', 'scheduled')",
            [],
        );
        assert!(result.is_err());

        // Plain request should succeed
        let result = conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, requested_date)
             VALUES ('a1', 'p1', 'b1', '2025-03-10')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_vet_branch_trigger() {
        let conn = seeded();

        let result = conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, vet_id, requested_date, confirmed_at, state)
             VALUES ('a1', 'p1', 'b2', 'v1', '2025-03-12', '2025-03-12 10:00:00', 'scheduled')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, vet_id, requested_date, confirmed_at, state)
             VALUES ('a1', 'p1', 'b1', 'v1', '2025-03-12', '2025-03-12 10:00:00', 'scheduled')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_branch_and_appointment_protection() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, requested_date)
             VALUES ('a1', 'p1', 'b1', '2025-03-10')",
            [],
        )
        .unwrap();

        assert!(conn.execute("DELETE FROM branches WHERE id = 'b1'", []).is_err());
        assert!(conn.execute("DELETE FROM appointments WHERE id = 'a1'", []).is_err());
        assert!(conn.execute("DELETE FROM branches WHERE id = 'b2'", []).is_ok());
    }

    #[test]
    fn test_record_link_unique() {
        let conn = seeded();
        conn.execute(
            "INSERT INTO appointments (id, patient_id, branch_id, requested_date)
             VALUES ('a1', 'p1', 'b1', '2025-03-10')",
            [],
        )
        .unwrap();

        let insert = "INSERT INTO medical_records (id, patient_id, appointment_id, recorded_at, diagnosis, treatment)
                      VALUES (?, 'p1', 'a1', '2025-03-10 10:00:00', 'dx', 'tx')";
        assert!(conn.execute(insert, ["r1"]).is_ok());
        assert!(conn.execute(insert, ["r2"]).is_err());

        // Unlinked notes are unconstrained
        let adhoc = "INSERT INTO medical_records (id, patient_id, recorded_at, diagnosis, treatment)
                     VALUES (?, 'p1', '2025-03-10 10:00:00', 'dx', 'tx')";
        assert!(conn.execute(adhoc, ["r3"]).is_ok());
        assert!(conn.execute(adhoc, ["r4"]).is_ok());
    }
}
