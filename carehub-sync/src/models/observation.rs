//! Resident observation models (vitals, notes).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::record::Record;

/// A single observation recorded against a resident.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    #[serde(default)]
    pub id: Uuid,
    pub resident_id: Uuid,
    /// Denormalised for display
    #[serde(default)]
    pub resident_name: String,
    /// Always UTC
    #[serde(with = "super::timestamp")]
    pub recorded_at: DateTime<Utc>,
    /// e.g. "BP", "Temp", "Note"
    #[serde(rename = "type")]
    pub kind: String,
    /// e.g. "120/80", "37.1"
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub recorded_by: String,
}

impl Observation {
    pub fn new(resident_id: Uuid, kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            resident_id,
            resident_name: String::new(),
            recorded_at: Utc::now(),
            kind: kind.into(),
            value: value.into(),
            recorded_by: String::new(),
        }
    }
}

impl Record for Observation {
    const ENTITY_TYPE: &'static str = "Observation";
    const FILE_NAME: &'static str = "Observations.json";
    const SEED_FILE: Option<&'static str> = Some("Observations.json");
    const API_PATH: &'static str = "api/Observations";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn stamp_recorded_at(&mut self, now: DateTime<Utc>) {
        self.recorded_at = now;
    }

    fn validate(&self) -> SyncResult<()> {
        if self.resident_id.is_nil() {
            return Err(SyncError::validation("Observation must belong to a resident"));
        }
        if self.kind.trim().is_empty() {
            return Err(SyncError::validation("Observation type is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_type_field_name_on_the_wire() {
        let obs = Observation::new(Uuid::new_v4(), "BP", "120/80");
        let json = serde_json::to_value(&obs).unwrap();
        assert_eq!(json["type"], "BP");
        assert!(json.get("recordedAt").is_some());
    }

    #[test]
    fn test_naive_recorded_at_read_as_utc() {
        let json = format!(
            r#"{{"id":"{}","residentId":"{}","recordedAt":"2024-05-01T09:30:00","type":"Temp","value":"37.1"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let obs: Observation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs.recorded_at.hour(), 9);
        assert_eq!(obs.recorded_at.minute(), 30);
    }

    #[test]
    fn test_validation() {
        assert!(Observation::new(Uuid::nil(), "BP", "120/80").validate().is_err());
        assert!(Observation::new(Uuid::new_v4(), " ", "x").validate().is_err());
        assert!(Observation::new(Uuid::new_v4(), "Note", "").validate().is_ok());
    }
}
