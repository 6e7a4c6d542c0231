//! Transition table of the appointment state machine.

use std::fmt;

use crate::models::AppointmentState;

/// Events applied to an existing appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Staff assigns or reassigns a vet and time
    Assign,
    /// The vet sees the patient and writes the record
    Attend,
    Cancel,
    /// Administrative shortcut: attended without a visit record
    MarkAttended,
    /// Back to requested, clearing vet and time
    Reactivate,
}

impl Event {
    pub const ALL: [Event; 5] = [
        Event::Assign,
        Event::Attend,
        Event::Cancel,
        Event::MarkAttended,
        Event::Reactivate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Assign => "assign",
            Event::Attend => "attend",
            Event::Cancel => "cancel",
            Event::MarkAttended => "mark attended",
            Event::Reactivate => "reactivate",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of looking up an event in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Apply the event and land in this state
    Move(AppointmentState),
    /// Already there; report success without changing state
    Stay,
    Reject,
}

/// Look up `event` from state `from`.
pub fn step(from: AppointmentState, event: Event) -> Step {
    use AppointmentState::*;

    match (event, from) {
        (Event::Assign, Requested | Scheduled) => Step::Move(Scheduled),
        (Event::Assign, Attended | Cancelled) => Step::Reject,

        (Event::Attend, Scheduled) => Step::Move(Attended),
        (Event::Attend, Attended) => Step::Stay,
        (Event::Attend, Requested | Cancelled) => Step::Reject,

        (Event::Cancel, Requested | Scheduled) => Step::Move(Cancelled),
        (Event::Cancel, Cancelled) => Step::Stay,
        (Event::Cancel, Attended) => Step::Reject,

        (Event::MarkAttended, Requested | Scheduled) => Step::Move(Attended),
        (Event::MarkAttended, Attended) => Step::Stay,
        (Event::MarkAttended, Cancelled) => Step::Reject,

        (Event::Reactivate, Scheduled | Attended) => Step::Move(Requested),
        (Event::Reactivate, Requested) => Step::Stay,
        (Event::Reactivate, Cancelled) => Step::Reject,
    }
}
