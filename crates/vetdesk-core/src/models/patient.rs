//! Owner and patient models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Owner profile, one-to-one with an OWNER principal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Owner {
    /// Unique owner ID
    pub id: String,
    /// Principal this profile belongs to
    pub principal_id: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub notes: String,
}

impl Owner {
    /// Create an empty profile for a principal.
    pub fn new(principal_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            principal_id,
            phone: String::new(),
            address: String::new(),
            city: String::new(),
            notes: String::new(),
        }
    }
}

/// A pet. Belongs to exactly one owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Unique patient ID
    pub id: String,
    /// Owning profile
    pub owner_id: String,
    /// Pet name
    pub name: String,
    /// Species as entered (e.g. "Perro", "canine")
    pub species: String,
    pub breed: String,
    pub sex: String,
    pub birth_date: NaiveDate,
    /// Known allergies, free text
    pub allergies: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(owner_id: String, name: String, species: String, birth_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            name,
            species,
            breed: String::new(),
            sex: String::new(),
            birth_date,
            allergies: String::new(),
        }
    }
}
