//! Optional collaborators consumed read-only by dashboards.
//!
//! Availability is decided once at startup through [`Features`]; a disabled
//! or missing collaborator yields an empty section and a warning, never an
//! error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Feature-availability flags for optional subsystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    /// Vaccination recommendation catalog is provisioned
    pub vaccination: bool,
    /// Shop product catalog is provisioned
    pub shop: bool,
}

/// Collaborator failures. Reported to callers as warnings.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

/// Species groups that have a vaccination schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesGroup {
    Canine,
    Feline,
}

impl SpeciesGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeciesGroup::Canine => "canine",
            SpeciesGroup::Feline => "feline",
        }
    }
}

/// Map a free-text species ("Perro", "canino", "Cat") to its group.
pub fn normalize_species(species: &str) -> Option<SpeciesGroup> {
    let value = species.trim().to_lowercase();
    if ["perr", "can", "dog"].iter().any(|p| value.starts_with(p)) {
        Some(SpeciesGroup::Canine)
    } else if ["gat", "fel", "cat"].iter().any(|p| value.starts_with(p)) {
        Some(SpeciesGroup::Feline)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeUnit {
    Weeks,
    Months,
    Years,
}

/// One entry of a species vaccination schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaccineRecommendation {
    pub name: String,
    pub species: SpeciesGroup,
    pub description: String,
    pub recommended_age: u32,
    pub age_unit: AgeUnit,
    /// Booster guidance, empty when none
    pub booster: String,
}

/// A product offered in the clinic shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub category: String,
    /// Price in cents
    pub price_cents: u64,
}

/// Source of vaccination recommendations.
pub trait VaccinationSchedule {
    fn recommendations(
        &self,
        species: SpeciesGroup,
    ) -> Result<Vec<VaccineRecommendation>, CollaboratorError>;
}

/// Source of featured shop products.
pub trait ProductCatalog {
    fn featured(&self, limit: usize) -> Result<Vec<Product>, CollaboratorError>;
}

/// Collaborators supplied by the host, if any.
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub vaccination: Option<&'a dyn VaccinationSchedule>,
    pub shop: Option<&'a dyn ProductCatalog>,
}
