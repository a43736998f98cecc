//! Resident profile models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::record::Record;

/// An emergency contact for a resident.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
    pub relationship: String,
}

/// A resident of the facility.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Resident {
    /// Nil until first stored
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Social insurance number
    pub sin: Option<String>,
    /// Date of birth as entered (e.g. "1941-05-17")
    pub dob: String,
    pub gender: Option<String>,

    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,

    /// Primary contact first
    pub emergency_contacts: Vec<EmergencyContact>,

    pub doctor_name: String,
    pub doctor_contact: String,

    /// Known allergies (e.g. "Peanuts", "Penicillin")
    pub allergies: Vec<String>,
    pub remarks: Option<String>,

    pub admission_date: Option<String>,
    /// e.g. "202"
    pub room_number: Option<String>,
    /// "Single", "Couple" or "MedicalBackup"
    pub room_type: Option<String>,
    /// "A" or "B" in couple rooms
    pub bed_label: Option<String>,
}

impl Resident {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            ..Default::default()
        }
    }

    /// First and last name joined, blank parts skipped.
    pub fn full_name(&self) -> String {
        [self.first_name.trim(), self.last_name.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Record for Resident {
    const ENTITY_TYPE: &'static str = "Resident";
    const FILE_NAME: &'static str = "Residents.json";
    const SEED_FILE: Option<&'static str> = Some("Residents.json");
    const API_PATH: &'static str = "api/Residents";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> SyncResult<()> {
        if self.full_name().is_empty() {
            return Err(SyncError::validation("Resident requires a first or last name"));
        }
        Ok(())
    }
}
