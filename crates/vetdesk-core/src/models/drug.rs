//! Branch formulary models.

use serde::{Deserialize, Serialize};

/// A drug stocked by a branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    pub id: String,
    pub name: String,
    /// Therapeutic category (e.g. "analgesics")
    pub category: String,
    pub description: String,
    /// Branch whose formulary lists this drug
    pub branch_id: String,
}

impl Drug {
    pub fn new(name: String, category: String, branch_id: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            category,
            description: String::new(),
            branch_id,
        }
    }
}

/// Quantity of a drug used while attending an appointment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugDose {
    pub drug_id: String,
    pub quantity: u32,
}

/// Persisted drug administration, unique per (appointment, drug).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DrugAdministration {
    pub appointment_id: String,
    pub drug_id: String,
    pub quantity: u32,
    pub recorded_at: String,
}
