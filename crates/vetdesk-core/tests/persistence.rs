//! File-backed database and configuration tests.

use std::io::Write;

use chrono::NaiveDate;
use vetdesk_core::db::Database;
use vetdesk_core::models::{Appointment, AppointmentState, Branch, Owner, Patient, Principal, Role};
use vetdesk_core::{open_database, open_with_config, CoreConfig};

fn seed(db: &Database) -> (Branch, Patient) {
    let branch = Branch::new("Central".into(), "Av. Principal 123".into());
    db.insert_branch(&branch).unwrap();
    let owner = Principal::new("carlos".into(), Role::Owner);
    db.insert_principal(&owner).unwrap();
    let profile = Owner::new(owner.id);
    db.insert_owner(&profile).unwrap();
    let patient = Patient::new(
        profile.id,
        "Firulais".into(),
        "Perro".into(),
        NaiveDate::from_ymd_opt(2021, 5, 20).unwrap(),
    );
    db.insert_patient(&patient).unwrap();
    (branch, patient)
}

#[test]
fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clinic.db");

    let appointment_id = {
        let db = Database::open(&path).unwrap();
        let (branch, patient) = seed(&db);
        let appointment = Appointment::requested(
            patient.id,
            branch.id,
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
        );
        db.insert_appointment(&appointment).unwrap();
        appointment.id
    };

    // Reopening applies the schema again without touching the data
    let db = Database::open(&path).unwrap();
    let appointment = db.get_appointment(&appointment_id).unwrap().unwrap();
    assert_eq!(appointment.state, AppointmentState::Requested);
    assert_eq!(db.list_branches().unwrap().len(), 1);
}

#[test]
fn test_schema_rejects_inconsistent_rows() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("clinic.db")).unwrap();
    let (branch, patient) = seed(&db);

    let mut appointment = Appointment::requested(
        patient.id,
        branch.id,
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
    );
    appointment.vet_id = Some("someone".into());
    assert!(db.insert_appointment(&appointment).is_err());
    assert!(db.list_appointments().unwrap().is_empty());
}

#[test]
fn test_open_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("from-config.db");

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[database]\npath = {:?}\n\n[policy]\noperators_may_book_directly = true\n",
        db_path.to_string_lossy()
    )
    .unwrap();

    let core = open_with_config(file.path().to_string_lossy().into_owned()).unwrap();
    core.create_branch("Central".into(), "A".into(), String::new())
        .unwrap();
    assert!(db_path.exists());

    let reopened = open_database(db_path.to_string_lossy().into_owned()).unwrap();
    assert_eq!(reopened.list_branches().unwrap().len(), 1);

    let config = CoreConfig::load(file.path()).unwrap();
    assert!(config.policy.operators_may_book_directly);
    assert!(!config.features.shop);
}
