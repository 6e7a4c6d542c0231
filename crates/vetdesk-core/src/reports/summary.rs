//! Aggregation views: counts per state, per-vet workload, completion rate.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::access::{AccessContext, AccessError, AccessResult, Gate, Visibility};
use crate::db::{AppointmentQuery, Database};
use crate::lifecycle::Clock;
use crate::models::{Appointment, AppointmentState, Branch, Principal, Role};

/// Appointment counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub requested: usize,
    pub scheduled: usize,
    pub attended: usize,
    pub cancelled: usize,
}

impl StateCounts {
    pub fn add(&mut self, state: AppointmentState) {
        match state {
            AppointmentState::Requested => self.requested += 1,
            AppointmentState::Scheduled => self.scheduled += 1,
            AppointmentState::Attended => self.attended += 1,
            AppointmentState::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.requested + self.scheduled + self.attended + self.cancelled
    }

    /// Requested plus scheduled.
    pub fn open(&self) -> usize {
        self.requested + self.scheduled
    }

    /// attended / (scheduled + attended); `None` when both are zero.
    pub fn completion_rate(&self) -> Option<f64> {
        let denominator = self.scheduled + self.attended;
        if denominator == 0 {
            None
        } else {
            Some(self.attended as f64 / denominator as f64)
        }
    }

    fn merge(&mut self, other: &StateCounts) {
        self.requested += other.requested;
        self.scheduled += other.scheduled;
        self.attended += other.attended;
        self.cancelled += other.cancelled;
    }
}

impl<'a> FromIterator<&'a Appointment> for StateCounts {
    fn from_iter<I: IntoIterator<Item = &'a Appointment>>(iter: I) -> Self {
        let mut counts = StateCounts::default();
        for appointment in iter {
            counts.add(appointment.state);
        }
        counts
    }
}

/// Load of one veterinarian.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VetWorkload {
    pub vet_id: String,
    pub vet_name: String,
    pub counts: StateCounts,
    pub completion_rate: Option<f64>,
    /// Next scheduled appointments by confirmed time
    pub upcoming: Vec<Appointment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSummary {
    pub branch_id: String,
    pub branch_name: String,
    pub counts: StateCounts,
    pub completion_rate: Option<f64>,
    pub vets: Vec<VetWorkload>,
}

/// Aggregation over every branch the principal may see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub generated_at: String,
    pub totals: StateCounts,
    pub completion_rate: Option<f64>,
    pub branches: Vec<BranchSummary>,
}

impl Summary {
    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV: one row per branch and one per vet.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Header
        csv.push_str("branch,vet,requested,scheduled,attended,cancelled,total,completion_rate\n");

        for branch in &self.branches {
            csv.push_str(&csv_row(&branch.branch_name, "", &branch.counts));
            for vet in &branch.vets {
                csv.push_str(&csv_row(&branch.branch_name, &vet.vet_name, &vet.counts));
            }
        }

        csv
    }
}

fn csv_row(branch: &str, vet: &str, counts: &StateCounts) -> String {
    format!(
        "{},{},{},{},{},{},{},{}\n",
        escape_csv(branch),
        escape_csv(vet),
        counts.requested,
        counts.scheduled,
        counts.attended,
        counts.cancelled,
        counts.total(),
        counts
            .completion_rate()
            .map(|r| format!("{:.4}", r))
            .unwrap_or_default(),
    )
}

/// Escape a string for CSV.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Computes aggregation views on demand.
pub struct Aggregator<'a> {
    db: &'a Database,
    clock: &'a dyn Clock,
    upcoming_per_vet: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(db: &'a Database, clock: &'a dyn Clock, upcoming_per_vet: usize) -> Self {
        Self {
            db,
            clock,
            upcoming_per_vet,
        }
    }

    /// Summary of one branch, or of every visible branch when `branch_id`
    /// is `None`.
    pub fn aggregate(&self, ctx: &AccessContext, branch_id: Option<&str>) -> AccessResult<Summary> {
        if ctx.is_owner() {
            return Err(AccessError::Forbidden("aggregations are for staff".into()));
        }

        let gate = Gate::new(self.db, ctx);
        let branches: Vec<Branch> = match (branch_id, ctx.visibility()) {
            (Some(id), visibility) => {
                let branch = gate.branch(id)?;
                if !visibility.covers(&branch.id) {
                    return Err(AccessError::not_found("branch", id));
                }
                vec![branch]
            }
            (None, Visibility::Unrestricted) => self.db.list_branches()?,
            (None, Visibility::Branch(own)) => vec![gate.branch(&own)?],
            (None, Visibility::Nothing) => Vec::new(),
        };

        let mut totals = StateCounts::default();
        let mut summaries = Vec::with_capacity(branches.len());
        for branch in branches {
            let summary = self.branch_summary(branch)?;
            totals.merge(&summary.counts);
            summaries.push(summary);
        }
        debug!("aggregated {} branch(es)", summaries.len());

        Ok(Summary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            totals,
            completion_rate: totals.completion_rate(),
            branches: summaries,
        })
    }

    /// Workload of one vet. Vets may read their own; staff that of vets in
    /// their branch.
    pub fn vet_workload(&self, ctx: &AccessContext, vet_id: &str) -> AccessResult<VetWorkload> {
        let visibility = ctx.visibility();
        let visible = |vet: &Principal| {
            if vet.id == ctx.principal_id || ctx.is_superuser {
                return true;
            }
            !ctx.is_owner()
                && vet
                    .branch_id
                    .as_deref()
                    .is_some_and(|branch_id| visibility.covers(branch_id))
        };
        let vet = self
            .db
            .get_principal(vet_id)?
            .filter(|v| v.role == Role::Vet && visible(v))
            .ok_or_else(|| AccessError::not_found("veterinarian", vet_id))?;

        let query = AppointmentQuery {
            vet_id: Some(vet.id.clone()),
            ..Default::default()
        };
        let appointments = self.db.query_appointments(&query)?;
        Ok(self.workload(vet.id, vet.display_name, &appointments))
    }

    fn branch_summary(&self, branch: Branch) -> AccessResult<BranchSummary> {
        let query = AppointmentQuery {
            branch_id: Some(branch.id.clone()),
            ..Default::default()
        };
        let appointments = self.db.query_appointments(&query)?;
        let counts: StateCounts = appointments.iter().collect();

        let mut by_vet: BTreeMap<&str, Vec<Appointment>> = BTreeMap::new();
        for appointment in &appointments {
            if let Some(vet_id) = appointment.vet_id.as_deref() {
                by_vet.entry(vet_id).or_default().push(appointment.clone());
            }
        }

        let mut vets = Vec::with_capacity(by_vet.len());
        for (vet_id, assigned) in by_vet {
            let name = self
                .db
                .get_principal(vet_id)?
                .map(|p| p.display_name)
                .unwrap_or_else(|| vet_id.to_string());
            vets.push(self.workload(vet_id.to_string(), name, &assigned));
        }
        vets.sort_by(|a, b| a.vet_name.cmp(&b.vet_name));

        Ok(BranchSummary {
            branch_id: branch.id,
            branch_name: branch.name,
            counts,
            completion_rate: counts.completion_rate(),
            vets,
        })
    }

    /// `appointments` must already be in listing order.
    fn workload(&self, vet_id: String, vet_name: String, appointments: &[Appointment]) -> VetWorkload {
        let now = self.clock.now();
        let counts: StateCounts = appointments.iter().collect();
        let upcoming = appointments
            .iter()
            .filter(|a| a.state == AppointmentState::Scheduled)
            .filter(|a| a.confirmed_at.is_some_and(|at| at >= now))
            .take(self.upcoming_per_vet)
            .cloned()
            .collect();

        VetWorkload {
            vet_id,
            vet_name,
            completion_rate: counts.completion_rate(),
            counts,
            upcoming,
        }
    }
}
