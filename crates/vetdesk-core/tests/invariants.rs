//! Property tests: random event sequences never leave an appointment in an
//! inconsistent state, and every outcome agrees with the transition table.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use proptest::prelude::*;
use vetdesk_core::access::AccessContext;
use vetdesk_core::db::Database;
use vetdesk_core::lifecycle::{
    step, AttendInput, Event, FixedClock, Lifecycle, LifecycleError, Step, Transition,
    ValidationError, VisitRequest,
};
use vetdesk_core::models::{
    AppointmentKind, AppointmentState, Branch, ClinicalFields, Owner, Patient, Principal, Role,
};

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

struct Desk {
    db: Database,
    clock: FixedClock,
    owner: AccessContext,
    admin: AccessContext,
    vet: AccessContext,
    patient_id: String,
    branch_id: String,
}

fn desk() -> Desk {
    let db = Database::open_in_memory().unwrap();
    let branch = Branch::new("Central".into(), "A".into());
    db.insert_branch(&branch).unwrap();

    let owner = Principal::new("owner".into(), Role::Owner);
    let admin = Principal::new("admin".into(), Role::Admin).in_branch(&branch.id);
    let vet = Principal::new("vet".into(), Role::Vet).in_branch(&branch.id);
    for p in [&owner, &admin, &vet] {
        db.insert_principal(p).unwrap();
    }
    let profile = Owner::new(owner.id.clone());
    db.insert_owner(&profile).unwrap();
    let patient = Patient::new(
        profile.id,
        "Michi".into(),
        "Gato".into(),
        NaiveDate::from_ymd_opt(2019, 9, 9).unwrap(),
    );
    db.insert_patient(&patient).unwrap();

    Desk {
        db,
        clock: FixedClock::new(at(1, 9)),
        owner: AccessContext::from_principal(&owner),
        admin: AccessContext::from_principal(&admin),
        vet: AccessContext::from_principal(&vet),
        patient_id: patient.id,
        branch_id: branch.id,
    }
}

impl Desk {
    fn fire(&self, id: &str, event: Event) -> Result<Transition, LifecycleError> {
        let engine = Lifecycle::new(&self.db, &self.clock);
        match event {
            Event::Assign => engine.assign(
                &self.admin,
                id,
                &self.vet.principal_id,
                at(12, 0).date(),
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            ),
            Event::Attend => engine
                .attend(
                    &self.vet,
                    id,
                    &AttendInput {
                        clinical: ClinicalFields::new("Control", "Observación"),
                        drugs: Vec::new(),
                    },
                )
                .map(|attendance| attendance.transition),
            Event::Cancel => engine.cancel(&self.admin, id),
            Event::MarkAttended => engine.mark_attended(&self.admin, id),
            Event::Reactivate => engine.reactivate(&self.admin, id),
        }
    }
}

fn events() -> impl Strategy<Value = Vec<Event>> {
    prop::collection::vec(prop::sample::select(Event::ALL.to_vec()), 1..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_event_sequences_preserve_invariants(sequence in events()) {
        let desk = desk();
        let id = Lifecycle::new(&desk.db, &desk.clock)
            .create_request(
                &desk.owner,
                &VisitRequest {
                    patient_id: desk.patient_id.clone(),
                    branch_id: desk.branch_id.clone(),
                    requested_date: at(10, 0).date(),
                    notes: String::new(),
                    kind: AppointmentKind::Consultation,
                    duration_minutes: None,
                },
            )
            .unwrap()
            .id;

        for event in sequence {
            let before = desk.db.get_appointment(&id).unwrap().unwrap();
            let outcome = desk.fire(&id, event);
            let after = desk.db.get_appointment(&id).unwrap().unwrap();

            prop_assert_eq!(after.invariant_violation(), None);

            match step(before.state, event) {
                Step::Move(next) => {
                    let transition = outcome.unwrap();
                    prop_assert!(transition.changed);
                    prop_assert_eq!(after.state, next);
                }
                Step::Stay => {
                    let transition = outcome.unwrap();
                    prop_assert!(!transition.changed);
                    prop_assert_eq!(after.state, before.state);
                }
                Step::Reject => {
                    let rejected = matches!(
                        outcome,
                        Err(LifecycleError::Validation(ValidationError::InvalidTransition { .. }))
                    );
                    prop_assert!(rejected);
                    prop_assert_eq!(&after, &before);
                }
            }

            if after.state == AppointmentState::Cancelled {
                // Terminal: nothing but idempotent cancels from here on
                prop_assert!(matches!(step(after.state, Event::Reactivate), Step::Reject));
            }
        }

        // At most one record per appointment, however often it was attended
        let records = desk.db.list_records_for_patient(&desk.patient_id).unwrap();
        prop_assert!(records.len() <= 1);
    }
}
