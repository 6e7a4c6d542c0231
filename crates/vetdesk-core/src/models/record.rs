//! Medical record models.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Clinical note produced when an appointment is attended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    /// Unique record ID
    pub id: String,
    /// Patient the record belongs to
    pub patient_id: String,
    /// Veterinarian who wrote it
    pub vet_id: Option<String>,
    /// Appointment that produced it; `None` for ad-hoc notes
    pub appointment_id: Option<String>,
    /// When the record was first written (clinic local time)
    pub recorded_at: NaiveDateTime,
    /// Clinical content
    pub clinical: ClinicalFields,
    /// Last update timestamp
    pub updated_at: String,
}

/// Clinical fields a vet fills in. Overwritten in place on re-attend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ClinicalFields {
    pub diagnosis: String,
    pub treatment: String,
    pub notes: String,
    /// Weight in kg
    pub weight_kg: Option<f64>,
    /// Body temperature in °C
    pub temperature_c: Option<f64>,
    /// Requested or performed exams
    pub exams: String,
    /// Stored path of an attached image (upload handled elsewhere)
    pub image_path: Option<String>,
    /// Next check-up
    pub follow_up: Option<NaiveDate>,
}

impl ClinicalFields {
    pub fn new(diagnosis: impl Into<String>, treatment: impl Into<String>) -> Self {
        Self {
            diagnosis: diagnosis.into(),
            treatment: treatment.into(),
            ..Self::default()
        }
    }
}

impl MedicalRecord {
    /// Create a record for a patient.
    pub fn new(
        patient_id: String,
        vet_id: Option<String>,
        recorded_at: NaiveDateTime,
        clinical: ClinicalFields,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            vet_id,
            appointment_id: None,
            recorded_at,
            clinical,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
