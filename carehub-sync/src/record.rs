//! The contract every persisted entity type fulfils.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::error::SyncResult;

/// A keyed record that can live in a local store, on the remote authority
/// and inside a sync queue snapshot.
///
/// The nil UUID means "not yet assigned".
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Tag written into sync queue items
    const ENTITY_TYPE: &'static str;
    /// File name of the writable local copy
    const FILE_NAME: &'static str;
    /// Bundled template copied on first load, if any
    const SEED_FILE: Option<&'static str>;
    /// Collection path on the remote authority, relative to the base URL
    const API_PATH: &'static str;

    fn id(&self) -> Uuid;

    fn set_id(&mut self, id: Uuid);

    fn has_id(&self) -> bool {
        !self.id().is_nil()
    }

    /// Assign a fresh identifier when none is set and return the current one.
    fn ensure_id(&mut self) -> Uuid {
        if !self.has_id() {
            self.set_id(Uuid::new_v4());
        }
        self.id()
    }

    /// Stamp any time-of-record field. Called once, before the first
    /// persistence attempt of a brand-new record.
    fn stamp_recorded_at(&mut self, _now: DateTime<Utc>) {}

    /// Reject records that must never be persisted.
    fn validate(&self) -> SyncResult<()> {
        Ok(())
    }
}
