//! Appointment models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Default visit length in minutes.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

/// Appointment lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    /// Requested by an owner, no vet or time yet
    Requested,
    /// Vet and confirmed time assigned
    Scheduled,
    /// Visit happened
    Attended,
    /// Cancelled by staff (terminal)
    Cancelled,
}

impl AppointmentState {
    pub const ALL: [AppointmentState; 4] = [
        AppointmentState::Requested,
        AppointmentState::Scheduled,
        AppointmentState::Attended,
        AppointmentState::Cancelled,
    ];

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Requested => "requested",
            AppointmentState::Scheduled => "scheduled",
            AppointmentState::Attended => "attended",
            AppointmentState::Cancelled => "cancelled",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(AppointmentState::Requested),
            "scheduled" => Some(AppointmentState::Scheduled),
            "attended" => Some(AppointmentState::Attended),
            "cancelled" => Some(AppointmentState::Cancelled),
            _ => None,
        }
    }

    /// Requested or scheduled: still waiting for the visit.
    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentState::Requested | AppointmentState::Scheduled)
    }
}

impl std::fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of visit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[default]
    Consultation,
    Vaccination,
    Surgery,
}

impl AppointmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentKind::Consultation => "consultation",
            AppointmentKind::Vaccination => "vaccination",
            AppointmentKind::Surgery => "surgery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "consultation" => Some(AppointmentKind::Consultation),
            "vaccination" => Some(AppointmentKind::Vaccination),
            "surgery" => Some(AppointmentKind::Surgery),
            _ => None,
        }
    }
}

/// The schedulable unit linking a patient, a branch and (once scheduled) a vet and time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    /// Unique appointment ID
    pub id: String,
    /// Patient being seen
    pub patient_id: String,
    /// Branch the visit belongs to
    pub branch_id: String,
    /// Assigned veterinarian (set once scheduled)
    pub vet_id: Option<String>,
    /// Date requested by the owner; synced to the confirmed date on assignment
    pub requested_date: NaiveDate,
    /// Confirmed date and time (set on scheduling)
    pub confirmed_at: Option<NaiveDateTime>,
    /// Lifecycle state
    pub state: AppointmentState,
    /// Visit kind
    pub kind: AppointmentKind,
    /// Expected duration
    pub duration_minutes: u32,
    /// Free-text notes from the requester
    pub notes: String,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Appointment {
    /// New owner request: no vet, no confirmed time.
    pub fn requested(patient_id: String, branch_id: String, requested_date: NaiveDate) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            branch_id,
            vet_id: None,
            requested_date,
            confirmed_at: None,
            state: AppointmentState::Requested,
            kind: AppointmentKind::default(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            notes: String::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Direct booking: vet and confirmed time set at creation.
    pub fn scheduled(
        patient_id: String,
        branch_id: String,
        vet_id: String,
        confirmed_at: NaiveDateTime,
    ) -> Self {
        let mut appointment = Self::requested(patient_id, branch_id, confirmed_at.date());
        appointment.vet_id = Some(vet_id);
        appointment.confirmed_at = Some(confirmed_at);
        appointment.state = AppointmentState::Scheduled;
        appointment
    }

    /// Date used for range filters: confirmed date if known, else requested date.
    pub fn effective_date(&self) -> NaiveDate {
        self.confirmed_at
            .map(|at| at.date())
            .unwrap_or(self.requested_date)
    }

    /// First state/field invariant this appointment breaks, if any.
    pub fn invariant_violation(&self) -> Option<&'static str> {
        match self.state {
            AppointmentState::Requested if self.vet_id.is_some() => {
                Some("requested appointment has a veterinarian")
            }
            AppointmentState::Requested if self.confirmed_at.is_some() => {
                Some("requested appointment has a confirmed time")
            }
            AppointmentState::Scheduled | AppointmentState::Attended
                if self.confirmed_at.is_none() =>
            {
                Some("scheduled or attended appointment lacks a confirmed time")
            }
            _ => None,
        }
    }

    /// Touch the updated_at timestamp.
    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().to_rfc3339();
    }
}
