//! Appointment lifecycle engine.
//!
//! Every transition runs as one write transaction: the authorization gate,
//! the guards and the row update commit together or not at all.
//!
//! | From | Event | To |
//! |---|---|---|
//! | - | request (owner) | requested |
//! | - | direct booking (admin) | scheduled |
//! | requested, scheduled | assign | scheduled |
//! | scheduled | attend | attended (+ medical record) |
//! | requested, scheduled | cancel | cancelled |
//! | requested, scheduled | mark attended | attended |
//! | scheduled, attended | reactivate | requested |

mod clock;
pub(crate) mod guards;
mod state;

pub use clock::*;
pub use state::*;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::{AccessContext, AccessError, Gate};
use crate::config::PolicyConfig;
use crate::db::{Database, DbError};
use crate::models::{
    Appointment, AppointmentKind, AppointmentState, ClinicalFields, DrugAdministration, DrugDose,
    MedicalRecord, Role, DEFAULT_DURATION_MINUTES,
};
use crate::records::{LinkOutcome, RecordLinker};

/// Reasons a transition is rejected before any mutation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("date {0} is in the past")]
    PastDate(NaiveDate),

    #[error("time {0} is in the past")]
    PastDateTime(NaiveDateTime),

    #[error("principal {0} is not a veterinarian")]
    NotAVeterinarian(String),

    #[error("veterinarian {0} is inactive")]
    InactiveVeterinarian(String),

    #[error("veterinarian {vet_id} does not work at branch {branch_id}")]
    VetOutsideBranch { vet_id: String, branch_id: String },

    #[error("cannot {event} an appointment that is {from}")]
    InvalidTransition { from: AppointmentState, event: Event },

    #[error("appointment is assigned to another veterinarian than {0}")]
    NotAssignedVeterinarian(String),

    #[error("drug {drug_id} is not in the formulary of branch {branch_id}")]
    DrugOutsideBranch { drug_id: String, branch_id: String },

    #[error("drug {0} administered with zero quantity")]
    ZeroQuantity(String),

    #[error("implausible {0}")]
    InvalidMeasurement(&'static str),

    #[error("invalid duration of {0} minutes")]
    InvalidDuration(u32),
}

/// Lifecycle errors.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl From<AccessError> for LifecycleError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Database(e) => LifecycleError::Database(e),
            AccessError::UnknownPrincipal(id) => LifecycleError::NotFound {
                kind: "principal",
                id,
            },
            AccessError::Forbidden(reason) => LifecycleError::Forbidden(reason),
            AccessError::NotFound { kind, id } => LifecycleError::NotFound { kind, id },
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Deployment choices that widen who may do what.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Let ADMIN_OP book scheduled appointments directly
    pub operators_may_book_directly: bool,
}

impl From<&PolicyConfig> for LifecyclePolicy {
    fn from(config: &PolicyConfig) -> Self {
        Self {
            operators_may_book_directly: config.operators_may_book_directly,
        }
    }
}

/// Owner request for a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitRequest {
    pub patient_id: String,
    pub branch_id: String,
    pub requested_date: NaiveDate,
    pub notes: String,
    pub kind: AppointmentKind,
    /// Defaults to 30 minutes
    pub duration_minutes: Option<u32>,
}

/// Staff booking with vet and time fixed up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectBooking {
    pub patient_id: String,
    pub branch_id: String,
    pub vet_id: String,
    pub confirmed_at: NaiveDateTime,
    pub notes: String,
    pub kind: AppointmentKind,
    pub duration_minutes: Option<u32>,
}

/// What the vet records when attending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttendInput {
    pub clinical: ClinicalFields,
    pub drugs: Vec<DrugDose>,
}

/// Result of a transition. `changed` is false for idempotent repeats.
#[derive(Debug, Clone)]
pub struct Transition {
    pub appointment: Appointment,
    pub changed: bool,
}

/// Result of an attend: the transition plus the linked record.
#[derive(Debug, Clone)]
pub struct Attendance {
    pub transition: Transition,
    pub record: MedicalRecord,
    pub link: LinkOutcome,
    pub administrations: Vec<DrugAdministration>,
}

/// The appointment lifecycle engine.
pub struct Lifecycle<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
    policy: LifecyclePolicy,
}

impl<'a> Lifecycle<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock) -> Self {
        Self {
            db,
            clock,
            policy: LifecyclePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: LifecyclePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// An owner requests a visit for one of their pets.
    pub fn create_request(
        &self,
        ctx: &AccessContext,
        request: &VisitRequest,
    ) -> LifecycleResult<Appointment> {
        ctx.require_role("request an appointment", |r| *r == Role::Owner)?;
        guards::date_not_in_past(request.requested_date, self.clock)?;
        let duration = guards::duration(request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;

        let appointment = self.db.write_transaction(|db| -> LifecycleResult<_> {
            let gate = Gate::new(db, ctx);
            let patient = gate.owned_patient(&request.patient_id)?;
            let branch = gate.branch(&request.branch_id)?;

            let mut appointment =
                Appointment::requested(patient.id, branch.id, request.requested_date);
            appointment.notes = request.notes.clone();
            appointment.kind = request.kind;
            appointment.duration_minutes = duration;
            db.insert_appointment(&appointment)?;
            Ok(appointment)
        })?;

        info!(
            "appointment {} requested for {} at branch {}",
            appointment.id, appointment.requested_date, appointment.branch_id
        );
        Ok(appointment)
    }

    /// Staff books a scheduled appointment directly.
    pub fn create_direct(
        &self,
        ctx: &AccessContext,
        booking: &DirectBooking,
    ) -> LifecycleResult<Appointment> {
        let operators = self.policy.operators_may_book_directly;
        ctx.require_role("book appointments directly", |r| {
            *r == Role::Admin || (operators && *r == Role::AdminOp)
        })?;
        guards::time_not_in_past(booking.confirmed_at, self.clock)?;
        let duration = guards::duration(booking.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;

        let appointment = self.db.write_transaction(|db| -> LifecycleResult<_> {
            let gate = Gate::new(db, ctx);
            let branch = gate.branch(&booking.branch_id)?;
            gate.require_branch(&branch.id)?;
            let patient = db
                .get_patient(&booking.patient_id)?
                .ok_or_else(|| AccessError::not_found("patient", &booking.patient_id))?;
            let vet = guards::vet_for_branch(db, &booking.vet_id, &branch.id)?;

            let mut appointment =
                Appointment::scheduled(patient.id, branch.id, vet.id, booking.confirmed_at);
            appointment.notes = booking.notes.clone();
            appointment.kind = booking.kind;
            appointment.duration_minutes = duration;
            db.insert_appointment(&appointment)?;
            Ok(appointment)
        })?;

        info!(
            "appointment {} booked for {} with vet {:?}",
            appointment.id,
            booking.confirmed_at,
            appointment.vet_id
        );
        Ok(appointment)
    }

    /// Assign or reassign the vet and confirmed time. Overwrites any earlier
    /// assignment.
    pub fn assign(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
        vet_id: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> LifecycleResult<Transition> {
        ctx.require_role("assign a veterinarian", Role::is_desk)?;
        let confirmed_at = date.and_time(time);

        let transition = self.db.write_transaction(|db| -> LifecycleResult<_> {
            let mut appointment = Gate::new(db, ctx).appointment_for_mutation(appointment_id)?;
            let Step::Move(next) = self.plan(&appointment, Event::Assign)? else {
                return Ok(Transition {
                    appointment,
                    changed: false,
                });
            };
            guards::time_not_in_past(confirmed_at, self.clock)?;
            let vet = guards::vet_for_branch(db, vet_id, &appointment.branch_id)?;

            appointment.vet_id = Some(vet.id);
            appointment.confirmed_at = Some(confirmed_at);
            appointment.requested_date = date;
            appointment.state = next;
            appointment.touch();
            db.update_appointment(&appointment)?;
            Ok(Transition {
                appointment,
                changed: true,
            })
        })?;

        info!(
            "appointment {} scheduled with vet {} at {}",
            appointment_id, vet_id, confirmed_at
        );
        Ok(transition)
    }

    /// The vet attends: state moves to attended and the appointment's
    /// medical record is created or overwritten.
    pub fn attend(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
        input: &AttendInput,
    ) -> LifecycleResult<Attendance> {
        ctx.require_role("attend appointments", |r| *r == Role::Vet)?;
        guards::measurements(&input.clinical)?;
        let now = self.clock.now();

        let attendance = self.db.write_transaction(|db| -> LifecycleResult<_> {
            let mut appointment = Gate::new(db, ctx).appointment_for_mutation(appointment_id)?;
            let step = self.plan(&appointment, Event::Attend)?;

            let assigned = appointment.vet_id.clone();
            let mut claimed = false;
            match assigned.as_deref() {
                Some(assigned) if assigned != ctx.principal_id && !ctx.is_superuser => {
                    warn!(
                        "vet {} tried to attend appointment {} assigned to {}",
                        ctx.principal_id, appointment_id, assigned
                    );
                    return Err(
                        ValidationError::NotAssignedVeterinarian(ctx.principal_id.clone()).into(),
                    );
                }
                None if ctx.role == Role::Vet => {
                    let vet = guards::vet_for_branch(db, &ctx.principal_id, &appointment.branch_id)?;
                    appointment.vet_id = Some(vet.id);
                    claimed = true;
                }
                _ => {}
            }
            let drugs = guards::doses(db, &appointment, &input.drugs)?;

            let changed = match step {
                Step::Move(next) => {
                    appointment.state = next;
                    appointment.confirmed_at.get_or_insert(now);
                    appointment.touch();
                    db.update_appointment(&appointment)?;
                    true
                }
                Step::Stay if claimed => {
                    appointment.touch();
                    db.update_appointment(&appointment)?;
                    false
                }
                Step::Stay | Step::Reject => false,
            };

            let linked = RecordLinker::new(db).upsert(
                &appointment,
                appointment.vet_id.as_deref(),
                &input.clinical,
                now,
            )?;

            let recorded_at = chrono::Utc::now().to_rfc3339();
            let mut administrations = Vec::with_capacity(drugs.len());
            for (drug, dose) in drugs.iter().zip(&input.drugs) {
                let administration = DrugAdministration {
                    appointment_id: appointment.id.clone(),
                    drug_id: drug.id.clone(),
                    quantity: dose.quantity,
                    recorded_at: recorded_at.clone(),
                };
                db.upsert_administration(&administration)?;
                administrations.push(administration);
            }

            Ok(Attendance {
                transition: Transition {
                    appointment,
                    changed,
                },
                record: linked.record,
                link: linked.outcome,
                administrations,
            })
        })?;

        info!(
            "appointment {} attended, record {} {}",
            appointment_id,
            attendance.record.id,
            attendance.link.as_str()
        );
        Ok(attendance)
    }

    /// Cancel an open appointment. Cancelling twice is a no-op.
    pub fn cancel(&self, ctx: &AccessContext, appointment_id: &str) -> LifecycleResult<Transition> {
        ctx.require_role("cancel appointments", Role::is_desk)?;
        self.apply(ctx, appointment_id, Event::Cancel, |_| {})
    }

    /// Administrative shortcut to attended without a visit record.
    pub fn mark_attended(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
    ) -> LifecycleResult<Transition> {
        ctx.require_role("mark appointments attended", Role::is_desk)?;
        let now = self.clock.now();
        self.apply(ctx, appointment_id, Event::MarkAttended, |appointment| {
            appointment.confirmed_at.get_or_insert(now);
        })
    }

    /// Return to requested, clearing vet and confirmed time. Any linked
    /// medical record stays linked.
    pub fn reactivate(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
    ) -> LifecycleResult<Transition> {
        ctx.require_role("reactivate appointments", Role::is_desk)?;
        self.apply(ctx, appointment_id, Event::Reactivate, |appointment| {
            appointment.vet_id = None;
            appointment.confirmed_at = None;
        })
    }

    /// Shared body of the transitions that only touch the appointment row.
    fn apply<F>(
        &self,
        ctx: &AccessContext,
        appointment_id: &str,
        event: Event,
        effects: F,
    ) -> LifecycleResult<Transition>
    where
        F: FnOnce(&mut Appointment),
    {
        let transition = self.db.write_transaction(|db| -> LifecycleResult<_> {
            let mut appointment = Gate::new(db, ctx).appointment_for_mutation(appointment_id)?;
            let Step::Move(next) = self.plan(&appointment, event)? else {
                return Ok(Transition {
                    appointment,
                    changed: false,
                });
            };

            appointment.state = next;
            effects(&mut appointment);
            appointment.touch();
            db.update_appointment(&appointment)?;
            Ok(Transition {
                appointment,
                changed: true,
            })
        })?;

        if transition.changed {
            info!(
                "appointment {} {}: now {}",
                appointment_id, event, transition.appointment.state
            );
        } else {
            debug!(
                "appointment {} already {}, {} is a no-op",
                appointment_id, transition.appointment.state, event
            );
        }
        Ok(transition)
    }

    /// Look up the event in the transition table, turning a rejection into
    /// a validation error.
    fn plan(&self, appointment: &Appointment, event: Event) -> LifecycleResult<Step> {
        let step = step(appointment.state, event);
        debug!(
            "appointment {}: {} from {} -> {:?}",
            appointment.id, event, appointment.state, step
        );
        if step == Step::Reject {
            warn!(
                "rejected {} on appointment {} in state {}",
                event, appointment.id, appointment.state
            );
            return Err(ValidationError::InvalidTransition {
                from: appointment.state,
                event,
            }
            .into());
        }
        Ok(step)
    }
}
