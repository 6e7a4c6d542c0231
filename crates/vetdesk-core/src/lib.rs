//! Vetdesk Core Library
//!
//! Appointment lifecycle and branch-scoped authorization for multi-branch
//! veterinary clinics.
//!
//! # Architecture
//!
//! ```text
//! principal + intent
//!        │
//!        ▼
//!  Identity & Role Context ──► Branch-Scope Filter
//!        │                           │
//!        └────────► Authorization Gate ◄┘
//!                          │ accepted
//!                          ▼
//!              Appointment Lifecycle Engine
//!          (one IMMEDIATE transaction per transition)
//!                          │ attend only
//!                          ▼
//!                Medical Record Linkage
//!
//!  Aggregation Views: read-only, computed from the scoped appointments
//! ```
//!
//! # Core Principle
//!
//! **Scoping fails closed.** A branch role without a branch sees nothing, and
//! staff asking for an out-of-branch id get "not found".
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence with CHECK-enforced state invariants
//! - [`models`]: Domain types (Branch, Principal, Appointment, MedicalRecord, ...)
//! - [`access`]: Role context, branch-scope filter and authorization gate
//! - [`lifecycle`]: Appointment state machine and transition guards
//! - [`records`]: Medical record linkage, ad-hoc notes and drug administrations
//! - [`reports`]: Scoped listings, aggregation, owner dashboard, export
//! - [`collab`]: Optional collaborators behind feature flags
//! - [`config`]: TOML configuration

pub mod access;
pub mod collab;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod models;
pub mod records;
pub mod reports;

// Re-export commonly used types
pub use access::{resolve_context, AccessContext, Visibility};
pub use config::CoreConfig;
pub use db::Database;
pub use lifecycle::{Clock, FixedClock, Lifecycle, SystemClock};
pub use models::{
    Appointment, AppointmentKind, AppointmentState, Branch, ClinicalFields, Drug, DrugDose,
    MedicalRecord, Owner, Patient, Principal, Role,
};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::collab::Collaborators;
use crate::lifecycle::{AttendInput, DirectBooking, LifecyclePolicy, VisitRequest};
use crate::records::Records;
use crate::reports::Aggregator;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum VetdeskError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<db::DbError> for VetdeskError {
    fn from(e: db::DbError) -> Self {
        match e {
            db::DbError::NotFound(what) => VetdeskError::NotFound(what),
            db::DbError::Constraint(reason) => VetdeskError::InvalidInput(reason),
            other => VetdeskError::DatabaseError(other.to_string()),
        }
    }
}

impl From<access::AccessError> for VetdeskError {
    fn from(e: access::AccessError) -> Self {
        match e {
            access::AccessError::Database(e) => e.into(),
            access::AccessError::UnknownPrincipal(id) => {
                VetdeskError::NotFound(format!("principal {}", id))
            }
            access::AccessError::Forbidden(reason) => VetdeskError::Forbidden(reason),
            access::AccessError::NotFound { kind, id } => {
                VetdeskError::NotFound(format!("{} {}", kind, id))
            }
        }
    }
}

impl From<lifecycle::LifecycleError> for VetdeskError {
    fn from(e: lifecycle::LifecycleError) -> Self {
        match e {
            lifecycle::LifecycleError::Database(e) => e.into(),
            lifecycle::LifecycleError::Validation(v) => VetdeskError::ValidationError(v.to_string()),
            lifecycle::LifecycleError::Forbidden(reason) => VetdeskError::Forbidden(reason),
            lifecycle::LifecycleError::NotFound { kind, id } => {
                VetdeskError::NotFound(format!("{} {}", kind, id))
            }
        }
    }
}

impl From<config::ConfigError> for VetdeskError {
    fn from(e: config::ConfigError) -> Self {
        VetdeskError::ConfigError(e.to_string())
    }
}

impl From<serde_json::Error> for VetdeskError {
    fn from(e: serde_json::Error) -> Self {
        VetdeskError::SerializationError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for VetdeskError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        VetdeskError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open or create a database at the given path with default configuration.
#[uniffi::export]
pub fn open_database(path: String) -> Result<Arc<ClinicCore>, VetdeskError> {
    let db = Database::open(&path)?;
    Ok(ClinicCore::wrap(db, CoreConfig::default()))
}

/// Create an in-memory database (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<ClinicCore>, VetdeskError> {
    let db = Database::open_in_memory()?;
    Ok(ClinicCore::wrap(db, CoreConfig::default()))
}

/// Load a TOML configuration file and open the database it names.
#[uniffi::export]
pub fn open_with_config(config_path: String) -> Result<Arc<ClinicCore>, VetdeskError> {
    let config = CoreConfig::load(&config_path)?;
    let db = Database::open(&config.database.path)?;
    log::info!(
        "opened {} (vaccination: {}, shop: {})",
        config.database.path.display(),
        config.features.vaccination,
        config.features.shop
    );
    Ok(ClinicCore::wrap(db, config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic core for FFI. Every operation names its acting
/// principal explicitly.
#[derive(uniffi::Object)]
pub struct ClinicCore {
    db: Arc<Mutex<Database>>,
    config: CoreConfig,
    clock: SystemClock,
}

impl ClinicCore {
    fn wrap(db: Database, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            db: Arc::new(Mutex::new(db)),
            config,
            clock: SystemClock,
        })
    }

    fn lifecycle<'a>(&'a self, db: &'a Database) -> Lifecycle<'a> {
        Lifecycle::new(db, &self.clock).with_policy(LifecyclePolicy::from(&self.config.policy))
    }

    fn aggregator<'a>(&'a self, db: &'a Database) -> Aggregator<'a> {
        Aggregator::new(db, &self.clock, self.config.policy.upcoming_per_vet)
    }
}

#[uniffi::export]
impl ClinicCore {
    // =========================================================================
    // Administrative Setup
    // =========================================================================

    /// Create a branch. Names are unique.
    pub fn create_branch(
        &self,
        name: String,
        address: String,
        phone: String,
    ) -> Result<FfiBranch, VetdeskError> {
        let db = self.db.lock()?;
        let mut branch = Branch::new(name, address);
        branch.phone = phone;
        db.insert_branch(&branch)?;
        Ok(branch.into())
    }

    pub fn get_branch(&self, branch_id: String) -> Result<Option<FfiBranch>, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.get_branch(&branch_id)?.map(|b| b.into()))
    }

    pub fn list_branches(&self) -> Result<Vec<FfiBranch>, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.list_branches()?.into_iter().map(|b| b.into()).collect())
    }

    /// Delete a branch. Fails while appointments or drugs reference it.
    pub fn delete_branch(&self, branch_id: String) -> Result<bool, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.delete_branch(&branch_id)?)
    }

    /// Create a staff or owner account.
    pub fn create_principal(
        &self,
        username: String,
        display_name: String,
        role: String,
        branch_id: Option<String>,
        superuser: bool,
    ) -> Result<FfiPrincipal, VetdeskError> {
        let role = Role::parse(&role)
            .ok_or_else(|| VetdeskError::InvalidInput(format!("Unknown role: {}", role)))?;
        let db = self.db.lock()?;
        let mut principal = Principal::new(username, role);
        principal.display_name = display_name;
        principal.branch_id = branch_id;
        principal.superuser = superuser;
        db.insert_principal(&principal)?;
        Ok(principal.into())
    }

    pub fn get_principal(&self, principal_id: String) -> Result<Option<FfiPrincipal>, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.get_principal(&principal_id)?.map(|p| p.into()))
    }

    /// Change a principal's branch affiliation and active flag.
    pub fn update_principal_affiliation(
        &self,
        principal_id: String,
        branch_id: Option<String>,
        active: bool,
    ) -> Result<FfiPrincipal, VetdeskError> {
        let db = self.db.lock()?;
        let mut principal = db
            .get_principal(&principal_id)?
            .ok_or_else(|| VetdeskError::NotFound(format!("principal {}", principal_id)))?;
        principal.branch_id = branch_id;
        principal.active = active;
        db.update_principal(&principal)?;
        Ok(principal.into())
    }

    /// Complete an OWNER principal's profile.
    pub fn create_owner_profile(
        &self,
        principal_id: String,
        phone: String,
        address: String,
        city: String,
    ) -> Result<FfiOwner, VetdeskError> {
        let db = self.db.lock()?;
        let principal = db
            .get_principal(&principal_id)?
            .ok_or_else(|| VetdeskError::NotFound(format!("principal {}", principal_id)))?;
        if principal.role != Role::Owner {
            return Err(VetdeskError::InvalidInput(format!(
                "principal {} is not an owner",
                principal_id
            )));
        }
        let mut owner = Owner::new(principal.id);
        owner.phone = phone;
        owner.address = address;
        owner.city = city;
        db.insert_owner(&owner)?;
        Ok(owner.into())
    }

    pub fn create_patient(
        &self,
        owner_id: String,
        name: String,
        species: String,
        breed: String,
        sex: String,
        birth_date: String,
    ) -> Result<FfiPatient, VetdeskError> {
        let birth_date = parse_date(&birth_date)?;
        let db = self.db.lock()?;
        let mut patient = Patient::new(owner_id, name, species, birth_date);
        patient.breed = breed;
        patient.sex = sex;
        db.insert_patient(&patient)?;
        Ok(patient.into())
    }

    /// Add a drug to a branch formulary.
    pub fn create_drug(
        &self,
        branch_id: String,
        name: String,
        category: String,
        description: String,
    ) -> Result<FfiDrug, VetdeskError> {
        let db = self.db.lock()?;
        let mut drug = Drug::new(name, category, branch_id);
        drug.description = description;
        db.insert_drug(&drug)?;
        Ok(drug.into())
    }

    pub fn list_drugs(&self, branch_id: String) -> Result<Vec<FfiDrug>, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.list_drugs_for_branch(&branch_id)?.into_iter().map(|d| d.into()).collect())
    }

    /// Delete a drug. Fails once it has been administered.
    pub fn delete_drug(&self, drug_id: String) -> Result<bool, VetdeskError> {
        let db = self.db.lock()?;
        Ok(db.delete_drug(&drug_id)?)
    }

    // =========================================================================
    // Lifecycle Operations
    // =========================================================================

    /// Owner requests a visit. Dates are `YYYY-MM-DD`.
    pub fn create_request(
        &self,
        principal_id: String,
        patient_id: String,
        branch_id: String,
        requested_date: String,
        notes: String,
        kind: Option<String>,
        duration_minutes: Option<u32>,
    ) -> Result<FfiAppointment, VetdeskError> {
        let request = VisitRequest {
            patient_id,
            branch_id,
            requested_date: parse_date(&requested_date)?,
            notes,
            kind: parse_kind(kind.as_deref())?,
            duration_minutes,
        };
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.lifecycle(&db).create_request(&ctx, &request)?.into())
    }

    /// Staff books a scheduled appointment. `confirmed_at` is `YYYY-MM-DDTHH:MM`.
    pub fn create_direct(
        &self,
        principal_id: String,
        patient_id: String,
        branch_id: String,
        vet_id: String,
        confirmed_at: String,
        notes: String,
        kind: Option<String>,
        duration_minutes: Option<u32>,
    ) -> Result<FfiAppointment, VetdeskError> {
        let booking = DirectBooking {
            patient_id,
            branch_id,
            vet_id,
            confirmed_at: parse_datetime(&confirmed_at)?,
            notes,
            kind: parse_kind(kind.as_deref())?,
            duration_minutes,
        };
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.lifecycle(&db).create_direct(&ctx, &booking)?.into())
    }

    /// Assign or reassign a vet. Time is `HH:MM`.
    pub fn assign(
        &self,
        principal_id: String,
        appointment_id: String,
        vet_id: String,
        confirmed_date: String,
        confirmed_time: String,
    ) -> Result<FfiTransition, VetdeskError> {
        let date = parse_date(&confirmed_date)?;
        let time = parse_time(&confirmed_time)?;
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let transition = self
            .lifecycle(&db)
            .assign(&ctx, &appointment_id, &vet_id, date, time)?;
        Ok(transition.into())
    }

    /// The vet attends and writes the visit record.
    pub fn attend(
        &self,
        principal_id: String,
        appointment_id: String,
        clinical: FfiClinicalFields,
        drugs: Vec<FfiDrugDose>,
    ) -> Result<FfiAttendance, VetdeskError> {
        let input = AttendInput {
            clinical: clinical.try_into()?,
            drugs: drugs
                .into_iter()
                .map(|d| DrugDose {
                    drug_id: d.drug_id,
                    quantity: d.quantity,
                })
                .collect(),
        };
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let attendance = self.lifecycle(&db).attend(&ctx, &appointment_id, &input)?;
        Ok(attendance.into())
    }

    pub fn cancel(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<FfiTransition, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.lifecycle(&db).cancel(&ctx, &appointment_id)?.into())
    }

    pub fn mark_attended(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<FfiTransition, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.lifecycle(&db).mark_attended(&ctx, &appointment_id)?.into())
    }

    pub fn reactivate(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<FfiTransition, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.lifecycle(&db).reactivate(&ctx, &appointment_id)?.into())
    }

    // =========================================================================
    // Listing & Aggregation
    // =========================================================================

    /// Get an appointment visible to the principal.
    pub fn get_appointment(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<FfiAppointment, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let appointment = access::Gate::new(&db, &ctx).visible_appointment(&appointment_id)?;
        Ok(appointment.into())
    }

    pub fn list_appointments(
        &self,
        principal_id: String,
        filter: FfiAppointmentFilter,
    ) -> Result<Vec<FfiAppointment>, VetdeskError> {
        let filter = filter.try_into()?;
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let appointments = reports::list_appointments(&db, &ctx, &filter)?;
        Ok(appointments.into_iter().map(|a| a.into()).collect())
    }

    /// Aggregate one branch, or every visible branch when `branch_id` is `None`.
    pub fn aggregate(
        &self,
        principal_id: String,
        branch_id: Option<String>,
    ) -> Result<FfiSummary, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let summary = self.aggregator(&db).aggregate(&ctx, branch_id.as_deref())?;
        Ok(summary.into())
    }

    /// Export an aggregation as JSON.
    pub fn export_summary_json(
        &self,
        principal_id: String,
        branch_id: Option<String>,
    ) -> Result<String, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let summary = self.aggregator(&db).aggregate(&ctx, branch_id.as_deref())?;
        Ok(summary.to_json()?)
    }

    /// Export an aggregation as CSV.
    pub fn export_summary_csv(
        &self,
        principal_id: String,
        branch_id: Option<String>,
    ) -> Result<String, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let summary = self.aggregator(&db).aggregate(&ctx, branch_id.as_deref())?;
        Ok(summary.to_csv())
    }

    pub fn vet_workload(
        &self,
        principal_id: String,
        vet_id: String,
    ) -> Result<FfiVetWorkload, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(self.aggregator(&db).vet_workload(&ctx, &vet_id)?.into())
    }

    /// Owner dashboard as JSON. Optional sections stay empty with a warning
    /// unless their feature flag is on and the host supplies the collaborator.
    pub fn owner_dashboard_json(&self, principal_id: String) -> Result<String, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let dashboard = reports::owner_dashboard(
            &db,
            &ctx,
            &self.clock,
            self.config.features,
            Collaborators::default(),
        )?;
        Ok(serde_json::to_string_pretty(&dashboard)?)
    }

    // =========================================================================
    // Directories
    // =========================================================================

    pub fn search_patients(
        &self,
        principal_id: String,
        prefix: String,
        limit: u32,
    ) -> Result<Vec<FfiPatient>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let patients = reports::search_patients(&db, &ctx, &prefix, limit as usize)?;
        Ok(patients.into_iter().map(|p| p.into()).collect())
    }

    pub fn get_patient(
        &self,
        principal_id: String,
        patient_id: String,
    ) -> Result<FfiPatient, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(access::Gate::new(&db, &ctx).visible_patient(&patient_id)?.into())
    }

    pub fn search_owners(
        &self,
        principal_id: String,
        query: String,
        limit: u32,
    ) -> Result<Vec<FfiOwner>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let owners = reports::search_owners(&db, &ctx, &query, limit as usize)?;
        Ok(owners.into_iter().map(|o| o.into()).collect())
    }

    pub fn list_vets(
        &self,
        principal_id: String,
        branch_id: String,
    ) -> Result<Vec<FfiPrincipal>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let vets = reports::list_vets(&db, &ctx, &branch_id)?;
        Ok(vets.into_iter().map(|v| v.into()).collect())
    }

    // =========================================================================
    // Medical Records
    // =========================================================================

    /// Vet writes a note without an appointment.
    pub fn create_adhoc_record(
        &self,
        principal_id: String,
        patient_id: String,
        clinical: FfiClinicalFields,
    ) -> Result<FfiMedicalRecord, VetdeskError> {
        let clinical: ClinicalFields = clinical.try_into()?;
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let record = Records::new(&db, &self.clock).create_adhoc(&ctx, &patient_id, &clinical)?;
        Ok(record.into())
    }

    pub fn get_record(
        &self,
        principal_id: String,
        record_id: String,
    ) -> Result<FfiMedicalRecord, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        Ok(Records::new(&db, &self.clock).get(&ctx, &record_id)?.into())
    }

    /// Record of an appointment, reporting whether it matched by link or by date.
    pub fn record_for_appointment(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<Option<FfiRecordMatch>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let found = Records::new(&db, &self.clock).for_appointment(&ctx, &appointment_id)?;
        Ok(found.map(|(record, rule)| FfiRecordMatch {
            record: record.into(),
            rule: rule.as_str().to_string(),
        }))
    }

    pub fn list_patient_records(
        &self,
        principal_id: String,
        patient_id: String,
    ) -> Result<Vec<FfiMedicalRecord>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let records = Records::new(&db, &self.clock).list_for_patient(&ctx, &patient_id)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    pub fn search_records(
        &self,
        principal_id: String,
        text: Option<String>,
        vet_id: Option<String>,
        from: Option<String>,
        to: Option<String>,
    ) -> Result<Vec<FfiMedicalRecord>, VetdeskError> {
        let search = records::RecordSearch {
            vet_id,
            text,
            from: from.as_deref().map(parse_date).transpose()?,
            to: to.as_deref().map(parse_date).transpose()?,
        };
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let records = Records::new(&db, &self.clock).search(&ctx, &search)?;
        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    pub fn list_administrations(
        &self,
        principal_id: String,
        appointment_id: String,
    ) -> Result<Vec<FfiDrugAdministration>, VetdeskError> {
        let db = self.db.lock()?;
        let ctx = resolve_context(&db, &principal_id)?;
        let given = Records::new(&db, &self.clock).administrations(&ctx, &appointment_id)?;
        Ok(given.into_iter().map(|a| a.into()).collect())
    }
}

// =========================================================================
// Input Parsing
// =========================================================================

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn parse_date(value: &str) -> Result<NaiveDate, VetdeskError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| VetdeskError::InvalidInput(format!("Invalid date: {}", value)))
}

fn parse_time(value: &str) -> Result<NaiveTime, VetdeskError> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| VetdeskError::InvalidInput(format!("Invalid time: {}", value)))
}

fn parse_datetime(value: &str) -> Result<NaiveDateTime, VetdeskError> {
    let value = value.trim();
    ["%Y-%m-%dT%H:%M", DATETIME_FORMAT, "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .ok_or_else(|| VetdeskError::InvalidInput(format!("Invalid date and time: {}", value)))
}

fn parse_kind(value: Option<&str>) -> Result<AppointmentKind, VetdeskError> {
    match value {
        None => Ok(AppointmentKind::default()),
        Some(kind) => AppointmentKind::parse(kind)
            .ok_or_else(|| VetdeskError::InvalidInput(format!("Unknown appointment kind: {}", kind))),
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe branch.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBranch {
    pub id: String,
    pub name: String,
    pub address: String,
    pub phone: String,
}

impl From<Branch> for FfiBranch {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.id,
            name: branch.name,
            address: branch.address,
            phone: branch.phone,
        }
    }
}

/// FFI-safe principal.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPrincipal {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub branch_id: Option<String>,
    pub active: bool,
    pub superuser: bool,
    pub specialty: Option<String>,
}

impl From<Principal> for FfiPrincipal {
    fn from(principal: Principal) -> Self {
        Self {
            id: principal.id,
            username: principal.username,
            display_name: principal.display_name,
            role: principal.role.as_str().to_string(),
            branch_id: principal.branch_id,
            active: principal.active,
            superuser: principal.superuser,
            specialty: principal.specialty,
        }
    }
}

/// FFI-safe owner profile.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiOwner {
    pub id: String,
    pub principal_id: String,
    pub phone: String,
    pub address: String,
    pub city: String,
}

impl From<Owner> for FfiOwner {
    fn from(owner: Owner) -> Self {
        Self {
            id: owner.id,
            principal_id: owner.principal_id,
            phone: owner.phone,
            address: owner.address,
            city: owner.city,
        }
    }
}

/// FFI-safe patient.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub birth_date: String,
    pub allergies: String,
}

impl From<Patient> for FfiPatient {
    fn from(patient: Patient) -> Self {
        Self {
            id: patient.id,
            owner_id: patient.owner_id,
            name: patient.name,
            species: patient.species,
            breed: patient.breed,
            sex: patient.sex,
            birth_date: patient.birth_date.to_string(),
            allergies: patient.allergies,
        }
    }
}

/// FFI-safe formulary drug.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrug {
    pub id: String,
    pub name: String,
    pub category: String,
    pub description: String,
    pub branch_id: String,
}

impl From<Drug> for FfiDrug {
    fn from(drug: Drug) -> Self {
        Self {
            id: drug.id,
            name: drug.name,
            category: drug.category,
            description: drug.description,
            branch_id: drug.branch_id,
        }
    }
}

/// FFI-safe appointment.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAppointment {
    pub id: String,
    pub patient_id: String,
    pub branch_id: String,
    pub vet_id: Option<String>,
    pub requested_date: String,
    pub confirmed_at: Option<String>,
    pub state: String,
    pub kind: String,
    pub duration_minutes: u32,
    pub notes: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Appointment> for FfiAppointment {
    fn from(appointment: Appointment) -> Self {
        Self {
            id: appointment.id,
            patient_id: appointment.patient_id,
            branch_id: appointment.branch_id,
            vet_id: appointment.vet_id,
            requested_date: appointment.requested_date.to_string(),
            confirmed_at: appointment
                .confirmed_at
                .map(|at| at.format(DATETIME_FORMAT).to_string()),
            state: appointment.state.as_str().to_string(),
            kind: appointment.kind.as_str().to_string(),
            duration_minutes: appointment.duration_minutes,
            notes: appointment.notes,
            created_at: appointment.created_at,
            updated_at: appointment.updated_at,
        }
    }
}

/// FFI-safe appointment listing filter. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiAppointmentFilter {
    pub state: Option<String>,
    pub vet_id: Option<String>,
    pub owner_id: Option<String>,
    pub patient_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
}

impl TryFrom<FfiAppointmentFilter> for reports::AppointmentFilter {
    type Error = VetdeskError;

    fn try_from(filter: FfiAppointmentFilter) -> Result<Self, Self::Error> {
        let state = filter
            .state
            .as_deref()
            .map(|s| {
                AppointmentState::parse(s)
                    .ok_or_else(|| VetdeskError::InvalidInput(format!("Unknown state: {}", s)))
            })
            .transpose()?;

        Ok(Self {
            state,
            vet_id: filter.vet_id,
            owner_id: filter.owner_id,
            patient_id: filter.patient_id,
            from: filter.from.as_deref().map(parse_date).transpose()?,
            to: filter.to.as_deref().map(parse_date).transpose()?,
            text: filter.text,
            limit: filter.limit.map(|l| l as usize),
        })
    }
}

/// FFI-safe clinical fields.
#[derive(Debug, Clone, Default, uniffi::Record)]
pub struct FfiClinicalFields {
    pub diagnosis: String,
    pub treatment: String,
    pub notes: String,
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub exams: String,
    pub image_path: Option<String>,
    /// `YYYY-MM-DD`
    pub follow_up: Option<String>,
}

impl TryFrom<FfiClinicalFields> for ClinicalFields {
    type Error = VetdeskError;

    fn try_from(fields: FfiClinicalFields) -> Result<Self, Self::Error> {
        Ok(Self {
            diagnosis: fields.diagnosis,
            treatment: fields.treatment,
            notes: fields.notes,
            weight_kg: fields.weight_kg,
            temperature_c: fields.temperature_c,
            exams: fields.exams,
            image_path: fields.image_path,
            follow_up: fields.follow_up.as_deref().map(parse_date).transpose()?,
        })
    }
}

impl From<ClinicalFields> for FfiClinicalFields {
    fn from(fields: ClinicalFields) -> Self {
        Self {
            diagnosis: fields.diagnosis,
            treatment: fields.treatment,
            notes: fields.notes,
            weight_kg: fields.weight_kg,
            temperature_c: fields.temperature_c,
            exams: fields.exams,
            image_path: fields.image_path,
            follow_up: fields.follow_up.map(|d| d.to_string()),
        }
    }
}

/// FFI-safe medical record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiMedicalRecord {
    pub id: String,
    pub patient_id: String,
    pub vet_id: Option<String>,
    pub appointment_id: Option<String>,
    pub recorded_at: String,
    pub clinical: FfiClinicalFields,
    pub updated_at: String,
}

impl From<MedicalRecord> for FfiMedicalRecord {
    fn from(record: MedicalRecord) -> Self {
        Self {
            id: record.id,
            patient_id: record.patient_id,
            vet_id: record.vet_id,
            appointment_id: record.appointment_id,
            recorded_at: record.recorded_at.format(DATETIME_FORMAT).to_string(),
            clinical: record.clinical.into(),
            updated_at: record.updated_at,
        }
    }
}

/// FFI-safe record lookup result. `rule` is `linked` or `legacy_date`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecordMatch {
    pub record: FfiMedicalRecord,
    pub rule: String,
}

/// FFI-safe drug dose given while attending.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugDose {
    pub drug_id: String,
    pub quantity: u32,
}

/// FFI-safe drug administration.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDrugAdministration {
    pub appointment_id: String,
    pub drug_id: String,
    pub quantity: u32,
    pub recorded_at: String,
}

impl From<models::DrugAdministration> for FfiDrugAdministration {
    fn from(administration: models::DrugAdministration) -> Self {
        Self {
            appointment_id: administration.appointment_id,
            drug_id: administration.drug_id,
            quantity: administration.quantity,
            recorded_at: administration.recorded_at,
        }
    }
}

/// FFI-safe transition result. `changed` is false for idempotent repeats.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiTransition {
    pub appointment: FfiAppointment,
    pub changed: bool,
}

impl From<lifecycle::Transition> for FfiTransition {
    fn from(transition: lifecycle::Transition) -> Self {
        Self {
            appointment: transition.appointment.into(),
            changed: transition.changed,
        }
    }
}

/// FFI-safe attend result. `link` is `created` or `updated`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAttendance {
    pub appointment: FfiAppointment,
    pub changed: bool,
    pub record: FfiMedicalRecord,
    pub link: String,
    pub administrations: Vec<FfiDrugAdministration>,
}

impl From<lifecycle::Attendance> for FfiAttendance {
    fn from(attendance: lifecycle::Attendance) -> Self {
        Self {
            appointment: attendance.transition.appointment.into(),
            changed: attendance.transition.changed,
            record: attendance.record.into(),
            link: attendance.link.as_str().to_string(),
            administrations: attendance
                .administrations
                .into_iter()
                .map(|a| a.into())
                .collect(),
        }
    }
}

/// FFI-safe per-state counts.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStateCounts {
    pub requested: u32,
    pub scheduled: u32,
    pub attended: u32,
    pub cancelled: u32,
    pub total: u32,
}

impl From<reports::StateCounts> for FfiStateCounts {
    fn from(counts: reports::StateCounts) -> Self {
        Self {
            requested: counts.requested as u32,
            scheduled: counts.scheduled as u32,
            attended: counts.attended as u32,
            cancelled: counts.cancelled as u32,
            total: counts.total() as u32,
        }
    }
}

/// FFI-safe vet workload.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiVetWorkload {
    pub vet_id: String,
    pub vet_name: String,
    pub counts: FfiStateCounts,
    pub completion_rate: Option<f64>,
    pub upcoming: Vec<FfiAppointment>,
}

impl From<reports::VetWorkload> for FfiVetWorkload {
    fn from(workload: reports::VetWorkload) -> Self {
        Self {
            vet_id: workload.vet_id,
            vet_name: workload.vet_name,
            counts: workload.counts.into(),
            completion_rate: workload.completion_rate,
            upcoming: workload.upcoming.into_iter().map(|a| a.into()).collect(),
        }
    }
}

/// FFI-safe branch summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiBranchSummary {
    pub branch_id: String,
    pub branch_name: String,
    pub counts: FfiStateCounts,
    pub completion_rate: Option<f64>,
    pub vets: Vec<FfiVetWorkload>,
}

impl From<reports::BranchSummary> for FfiBranchSummary {
    fn from(summary: reports::BranchSummary) -> Self {
        Self {
            branch_id: summary.branch_id,
            branch_name: summary.branch_name,
            counts: summary.counts.into(),
            completion_rate: summary.completion_rate,
            vets: summary.vets.into_iter().map(|v| v.into()).collect(),
        }
    }
}

/// FFI-safe aggregation.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSummary {
    pub generated_at: String,
    pub totals: FfiStateCounts,
    pub completion_rate: Option<f64>,
    pub branches: Vec<FfiBranchSummary>,
}

impl From<reports::Summary> for FfiSummary {
    fn from(summary: reports::Summary) -> Self {
        Self {
            generated_at: summary.generated_at,
            totals: summary.totals.into(),
            completion_rate: summary.completion_rate,
            branches: summary.branches.into_iter().map(|b| b.into()).collect(),
        }
    }
}
