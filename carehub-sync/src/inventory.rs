//! Stock adjustment and local record queries

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::{clamp_stock, Medication, MedicationOrder, Observation};
use crate::store::JsonStore;

/// The sanctioned path for changing a medication's stock level.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Add `delta` to the stock of `medication_id`, clamping at zero.
    ///
    /// Returns the new level, or `None` when the medication is unknown.
    async fn adjust_stock(&self, medication_id: Uuid, delta: i64) -> SyncResult<Option<u32>>;
}

#[async_trait]
impl StockLedger for JsonStore<Medication> {
    async fn adjust_stock(&self, medication_id: Uuid, delta: i64) -> SyncResult<Option<u32>> {
        let adjusted = self
            .modify(move |items| {
                items
                    .iter_mut()
                    .find(|m| m.id == medication_id)
                    .map(|medication| {
                        let before = medication.stock_quantity;
                        medication.stock_quantity = clamp_stock(before, delta);
                        (before, medication.stock_quantity)
                    })
            })
            .await?;

        match adjusted {
            Some((before, after)) => {
                tracing::info!(%medication_id, delta, before, after, "Adjusted stock");
                Ok(Some(after))
            }
            None => {
                tracing::warn!(%medication_id, delta, "Stock adjustment for unknown medication");
                Ok(None)
            }
        }
    }
}

impl JsonStore<Medication> {
    /// Facility inventory at or below its reorder level, sorted by name.
    pub async fn low_stock(&self) -> SyncResult<Vec<Medication>> {
        let mut items: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|m| m.is_inventory() && m.is_low_stock())
            .collect();
        items.sort_by(|a, b| a.med_name.to_lowercase().cmp(&b.med_name.to_lowercase()));
        Ok(items)
    }
}

impl JsonStore<Observation> {
    /// A resident's observations, newest first.
    pub async fn by_resident(&self, resident_id: Uuid) -> SyncResult<Vec<Observation>> {
        let mut items: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|o| o.resident_id == resident_id)
            .collect();
        items.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(items)
    }

    /// Observations recorded within the last `days` days, newest first.
    pub async fn recent(&self, resident_id: Uuid, days: i64) -> SyncResult<Vec<Observation>> {
        let cutoff = Utc::now() - Duration::days(days);
        Ok(self
            .by_resident(resident_id)
            .await?
            .into_iter()
            .filter(|o| o.recorded_at >= cutoff)
            .collect())
    }

    pub async fn latest(&self, resident_id: Uuid) -> SyncResult<Option<Observation>> {
        Ok(self.by_resident(resident_id).await?.into_iter().next())
    }
}

impl JsonStore<MedicationOrder> {
    /// Orders for one medication, newest request first.
    pub async fn by_medication(&self, medication_id: Uuid) -> SyncResult<Vec<MedicationOrder>> {
        let mut items: Vec<_> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|o| o.medication_id == medication_id)
            .collect();
        items.sort_by(|a, b| b.requested_at.cmp(&a.requested_at));
        Ok(items)
    }
}
