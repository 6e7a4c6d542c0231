//! Owner dashboard: pets, appointments split at "now", records and stats.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::access::{AccessContext, AccessResult, Gate};
use crate::collab::{normalize_species, Collaborators, Features, Product, VaccineRecommendation};
use crate::db::{AppointmentQuery, Database};
use crate::lifecycle::Clock;
use crate::models::{Appointment, MedicalRecord, Owner, Patient};

/// Entries shown per dashboard list.
const DASHBOARD_LIST_LIMIT: usize = 5;
/// Featured shop products.
const FEATURED_PRODUCTS: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerStats {
    pub pets: usize,
    /// Appointments at or after now
    pub active_appointments: usize,
    pub reports: usize,
    /// Distinct veterinarians across all appointments
    pub veterinarians: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PetVaccinations {
    pub patient_id: String,
    pub recommendations: Vec<VaccineRecommendation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnerDashboard {
    /// `None` while the owner has not completed their profile
    pub owner: Option<Owner>,
    pub pets: Vec<Patient>,
    pub next_appointment: Option<Appointment>,
    pub upcoming: Vec<Appointment>,
    /// Past appointments, most recent first
    pub recent: Vec<Appointment>,
    pub recent_records: Vec<MedicalRecord>,
    pub stats: OwnerStats,
    pub vaccinations: Vec<PetVaccinations>,
    pub featured_products: Vec<Product>,
    /// Optional sections that could not be filled
    pub warnings: Vec<String>,
}

/// Point in time an appointment is expected: its confirmed time, else the
/// start of its requested day.
fn expected_at(appointment: &Appointment) -> NaiveDateTime {
    appointment
        .confirmed_at
        .unwrap_or_else(|| appointment.requested_date.and_time(chrono::NaiveTime::MIN))
}

/// Build the dashboard of the acting owner.
pub fn owner_dashboard(
    db: &Database,
    ctx: &AccessContext,
    clock: &dyn Clock,
    features: Features,
    collaborators: Collaborators<'_>,
) -> AccessResult<OwnerDashboard> {
    let Some(owner) = Gate::new(db, ctx).owner_profile()? else {
        return Ok(OwnerDashboard::default());
    };

    let pets = db.list_patients_for_owner(&owner.id)?;
    let mut appointments = db.query_appointments(&AppointmentQuery {
        owner_id: Some(owner.id.clone()),
        ..Default::default()
    })?;
    appointments.sort_by_key(expected_at);

    let mut records = Vec::new();
    for pet in &pets {
        records.extend(db.list_records_for_patient(&pet.id)?);
    }
    records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

    let now = clock.now();
    let (upcoming, mut past): (Vec<_>, Vec<_>) = appointments
        .iter()
        .cloned()
        .partition(|a| expected_at(a) >= now);
    past.reverse();

    let stats = OwnerStats {
        pets: pets.len(),
        active_appointments: upcoming.len(),
        reports: records.len(),
        veterinarians: appointments
            .iter()
            .filter_map(|a| a.vet_id.as_deref())
            .collect::<HashSet<_>>()
            .len(),
    };

    let mut warnings = Vec::new();
    let vaccinations = vaccination_section(&pets, features, collaborators, &mut warnings);
    let featured_products = shop_section(features, collaborators, &mut warnings);

    Ok(OwnerDashboard {
        owner: Some(owner),
        next_appointment: upcoming.first().cloned(),
        upcoming: upcoming.into_iter().take(DASHBOARD_LIST_LIMIT).collect(),
        recent: past.into_iter().take(DASHBOARD_LIST_LIMIT).collect(),
        recent_records: records.into_iter().take(DASHBOARD_LIST_LIMIT).collect(),
        pets,
        stats,
        vaccinations,
        featured_products,
        warnings,
    })
}

fn vaccination_section(
    pets: &[Patient],
    features: Features,
    collaborators: Collaborators<'_>,
    warnings: &mut Vec<String>,
) -> Vec<PetVaccinations> {
    let schedule = match (features.vaccination, collaborators.vaccination) {
        (true, Some(schedule)) => schedule,
        _ => {
            warnings.push("vaccination recommendations are not available".into());
            return Vec::new();
        }
    };

    let mut section = Vec::new();
    for pet in pets {
        let Some(species) = normalize_species(&pet.species) else {
            warnings.push(format!("no vaccination schedule for species '{}'", pet.species));
            continue;
        };
        match schedule.recommendations(species) {
            Ok(recommendations) => section.push(PetVaccinations {
                patient_id: pet.id.clone(),
                recommendations,
            }),
            Err(e) => {
                warn!("vaccination schedule failed for {}: {}", species.as_str(), e);
                warnings.push(e.to_string());
            }
        }
    }
    section
}

fn shop_section(
    features: Features,
    collaborators: Collaborators<'_>,
    warnings: &mut Vec<String>,
) -> Vec<Product> {
    let catalog = match (features.shop, collaborators.shop) {
        (true, Some(catalog)) => catalog,
        _ => {
            warnings.push("shop products are not available".into());
            return Vec::new();
        }
    };

    catalog.featured(FEATURED_PRODUCTS).unwrap_or_else(|e| {
        warn!("product catalog failed: {}", e);
        warnings.push(e.to_string());
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{
        AgeUnit, CollaboratorError, ProductCatalog, SpeciesGroup, VaccinationSchedule,
    };
    use crate::lifecycle::FixedClock;
    use crate::models::{Branch, ClinicalFields, Principal, Role};
    use chrono::NaiveDate;

    struct CoreVaccines;

    impl VaccinationSchedule for CoreVaccines {
        fn recommendations(
            &self,
            species: SpeciesGroup,
        ) -> Result<Vec<VaccineRecommendation>, CollaboratorError> {
            Ok(vec![VaccineRecommendation {
                name: match species {
                    SpeciesGroup::Canine => "Séxtuple".into(),
                    SpeciesGroup::Feline => "Triple felina".into(),
                },
                species,
                description: String::new(),
                recommended_age: 8,
                age_unit: AgeUnit::Weeks,
                booster: "anual".into(),
            }])
        }
    }

    struct ClosedShop;

    impl ProductCatalog for ClosedShop {
        fn featured(&self, _limit: usize) -> Result<Vec<Product>, CollaboratorError> {
            Err(CollaboratorError::Unavailable("products table missing".into()))
        }
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn setup() -> (Database, AccessContext, Patient) {
        let db = Database::open_in_memory().unwrap();
        let branch = Branch::new("Central".into(), "A".into());
        db.insert_branch(&branch).unwrap();
        let vet = Principal::new("vera".into(), Role::Vet).in_branch(&branch.id);
        let principal = Principal::new("carlos".into(), Role::Owner);
        db.insert_principal(&vet).unwrap();
        db.insert_principal(&principal).unwrap();
        let owner = Owner::new(principal.id.clone());
        db.insert_owner(&owner).unwrap();
        let dog = Patient::new(owner.id.clone(), "Firulais".into(), "Perro".into(), at(1, 0).date());
        let bunny = Patient::new(owner.id, "Tambor".into(), "Conejo".into(), at(1, 0).date());
        db.insert_patient(&dog).unwrap();
        db.insert_patient(&bunny).unwrap();

        let past = Appointment::scheduled(dog.id.clone(), branch.id.clone(), vet.id.clone(), at(2, 10));
        let soon = Appointment::scheduled(dog.id.clone(), branch.id.clone(), vet.id.clone(), at(12, 10));
        let later = Appointment::requested(dog.id.clone(), branch.id.clone(), at(20, 0).date());
        for a in [&past, &soon, &later] {
            db.insert_appointment(a).unwrap();
        }
        let mut record = MedicalRecord::new(dog.id.clone(), Some(vet.id), at(2, 11), ClinicalFields::new("Otitis", "Gotas"));
        record.appointment_id = Some(past.id);
        db.insert_record(&record).unwrap();

        (db, AccessContext::from_principal(&principal), dog)
    }

    #[test]
    fn test_dashboard_split_and_stats() {
        let (db, ctx, dog) = setup();
        let clock = FixedClock::new(at(5, 9));

        let dashboard =
            owner_dashboard(&db, &ctx, &clock, Features::default(), Collaborators::default()).unwrap();
        assert_eq!(dashboard.pets.len(), 2);
        assert_eq!(dashboard.upcoming.len(), 2);
        assert_eq!(dashboard.recent.len(), 1);
        assert_eq!(dashboard.next_appointment.unwrap().confirmed_at, Some(at(12, 10)));
        assert_eq!(
            dashboard.stats,
            OwnerStats {
                pets: 2,
                active_appointments: 2,
                reports: 1,
                veterinarians: 1,
            }
        );
        assert_eq!(dashboard.recent_records[0].patient_id, dog.id);
        // Both optional sections degrade to warnings
        assert!(dashboard.vaccinations.is_empty());
        assert!(dashboard.featured_products.is_empty());
        assert_eq!(dashboard.warnings.len(), 2);
    }

    #[test]
    fn test_dashboard_collaborators() {
        let (db, ctx, dog) = setup();
        let clock = FixedClock::new(at(5, 9));
        let features = Features {
            vaccination: true,
            shop: true,
        };
        let collaborators = Collaborators {
            vaccination: Some(&CoreVaccines),
            shop: Some(&ClosedShop),
        };

        let dashboard = owner_dashboard(&db, &ctx, &clock, features, collaborators).unwrap();
        assert_eq!(dashboard.vaccinations.len(), 1);
        assert_eq!(dashboard.vaccinations[0].patient_id, dog.id);
        assert_eq!(dashboard.vaccinations[0].recommendations[0].name, "Séxtuple");
        // Rabbit has no schedule; shop failure is reported, not raised
        assert_eq!(dashboard.warnings.len(), 2);
        assert!(dashboard.featured_products.is_empty());
    }

    #[test]
    fn test_missing_profile_is_empty() {
        let (db, _, _) = setup();
        let fresh = Principal::new("nueva".into(), Role::Owner);
        db.insert_principal(&fresh).unwrap();
        let clock = FixedClock::new(at(5, 9));

        let dashboard = owner_dashboard(
            &db,
            &AccessContext::from_principal(&fresh),
            &clock,
            Features::default(),
            Collaborators::default(),
        )
        .unwrap();
        assert_eq!(dashboard, OwnerDashboard::default());
    }
}
