//! Medication and inventory models.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::record::Record;

/// A medication, either facility inventory (`resident_id` unset) or a
/// resident's prescription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Medication {
    pub id: Uuid,
    pub med_name: String,
    pub dosage: String,
    pub usage: Option<String>,
    pub quantity: u32,
    pub quantity_unit: String,

    /// Units on hand. Never negative.
    pub stock_quantity: u32,
    /// Low-stock threshold
    pub reorder_level: i32,
    pub expiry_date: DateTime<Utc>,

    pub resident_id: Option<Uuid>,
    pub resident_name: Option<String>,
    pub times_per_day: u32,
}

impl Default for Medication {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            med_name: String::new(),
            dosage: String::new(),
            usage: None,
            quantity: 0,
            quantity_unit: String::new(),
            stock_quantity: 0,
            reorder_level: 10,
            expiry_date: Utc::now() + Duration::days(182),
            resident_id: None,
            resident_name: None,
            times_per_day: 3,
        }
    }
}

impl Medication {
    pub fn new(med_name: impl Into<String>, stock_quantity: u32, reorder_level: i32) -> Self {
        Self {
            med_name: med_name.into(),
            stock_quantity,
            reorder_level,
            ..Default::default()
        }
    }

    pub fn is_low_stock(&self) -> bool {
        i64::from(self.stock_quantity) <= i64::from(self.reorder_level)
    }

    /// Facility-wide stock rather than a resident's own supply.
    pub fn is_inventory(&self) -> bool {
        self.resident_id.map_or(true, |id| id.is_nil())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().date_naive() > self.expiry_date.date_naive()
    }

    pub fn days_until_expiry(&self) -> i64 {
        (self.expiry_date.date_naive() - Utc::now().date_naive()).num_days()
    }
}

/// Apply `delta` to `stock`, clamping at zero and saturating at `u32::MAX`.
pub fn clamp_stock(stock: u32, delta: i64) -> u32 {
    let adjusted = i64::from(stock).saturating_add(delta);
    adjusted.clamp(0, i64::from(u32::MAX)) as u32
}

impl Record for Medication {
    const ENTITY_TYPE: &'static str = "Medication";
    const FILE_NAME: &'static str = "Medications.json";
    const SEED_FILE: Option<&'static str> = Some("Inventory.json");
    const API_PATH: &'static str = "api/medications";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> SyncResult<()> {
        if self.med_name.trim().is_empty() {
            return Err(SyncError::validation("Medication name is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_low_stock_threshold_inclusive() {
        assert!(Medication::new("Metformin", 15, 15).is_low_stock());
        assert!(Medication::new("Metformin", 10, 15).is_low_stock());
        assert!(!Medication::new("Metformin", 16, 15).is_low_stock());
    }

    #[test]
    fn test_clamp_stock() {
        assert_eq!(clamp_stock(10, 30), 40);
        assert_eq!(clamp_stock(10, -3), 7);
        assert_eq!(clamp_stock(10, -50), 0);
        assert_eq!(clamp_stock(u32::MAX, 1), u32::MAX);
    }

    #[test]
    fn test_expiry_helpers() {
        let mut med = Medication::new("Aspirin", 5, 2);
        med.expiry_date = Utc::now() - Duration::days(2);
        assert!(med.is_expired());
        assert!(med.days_until_expiry() < 0);

        med.expiry_date = Utc::now() + Duration::days(10);
        assert!(!med.is_expired());
        assert_eq!(med.days_until_expiry(), 10);
    }

    #[test]
    fn test_inventory_vs_prescription() {
        let mut med = Medication::new("Aspirin", 5, 2);
        assert!(med.is_inventory());
        med.resident_id = Some(Uuid::nil());
        assert!(med.is_inventory());
        med.resident_id = Some(Uuid::new_v4());
        assert!(!med.is_inventory());
    }

    #[test]
    fn test_blank_name_rejected() {
        assert!(Medication::new("  ", 1, 1).validate().is_err());
    }
}
