//! Clinic branch models.

use serde::{Deserialize, Serialize};

/// A physical clinic location. Unit of staff and appointment visibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    /// Unique branch ID
    pub id: String,
    /// Display name, unique across branches
    pub name: String,
    /// Street address
    pub address: String,
    /// Contact phone
    pub phone: String,
}

impl Branch {
    /// Create a new branch with a fresh ID.
    pub fn new(name: String, address: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            address,
            phone: String::new(),
        }
    }
}
