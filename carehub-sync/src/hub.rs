//! Composition root wiring stores, remotes, the queue and the order manager
//! for one device.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::{Session, SyncConfig};
use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::inventory::StockLedger;
use crate::models::{Medication, MedicationOrder, Observation, Resident};
use crate::orders::OrderLifecycle;
use crate::record::Record;
use crate::remote::HttpRemote;
use crate::repository::{replay_queue, ReplayTarget, SyncRepository};
use crate::store::{JsonStore, StoreConfig};
use crate::sync_queue::{JsonSyncQueue, SyncQueue, SyncQueueItem};

/// Every service the application needs, built once per process.
pub struct CareHub {
    config: SyncConfig,
    session: Session,
    connectivity: Arc<dyn Connectivity>,
    queue: Arc<JsonSyncQueue>,

    resident_store: Arc<JsonStore<Resident>>,
    medication_store: Arc<JsonStore<Medication>>,
    observation_store: Arc<JsonStore<Observation>>,

    residents: SyncRepository<Resident>,
    medications: SyncRepository<Medication>,
    observations: SyncRepository<Observation>,
    orders: OrderLifecycle,
}

impl CareHub {
    pub fn open(config: SyncConfig, connectivity: Arc<dyn Connectivity>) -> SyncResult<Self> {
        config.validate()?;
        let session = config.session();

        let queue = Arc::new(JsonSyncQueue::new(store::<SyncQueueItem>(&config)));
        let resident_store = Arc::new(store::<Resident>(&config));
        let medication_store = Arc::new(store::<Medication>(&config));
        let observation_store = Arc::new(store::<Observation>(&config));
        let order_store = Arc::new(store::<MedicationOrder>(&config));

        let residents = repository(
            &config,
            &session,
            resident_store.clone(),
            queue.clone(),
            connectivity.clone(),
        )?;
        let medications = repository(
            &config,
            &session,
            medication_store.clone(),
            queue.clone(),
            connectivity.clone(),
        )?;
        let observations = repository(
            &config,
            &session,
            observation_store.clone(),
            queue.clone(),
            connectivity.clone(),
        )?;
        let orders = OrderLifecycle::new(order_store, medication_store.clone(), session.clone());

        tracing::info!(
            data_dir = %config.data_dir.display(),
            api_base_url = %config.api_base_url,
            delete_policy = ?config.delete_policy,
            "CareHub opened"
        );

        Ok(Self {
            config,
            session,
            connectivity,
            queue,
            resident_store,
            medication_store,
            observation_store,
            residents,
            medications,
            observations,
            orders,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn residents(&self) -> &SyncRepository<Resident> {
        &self.residents
    }

    pub fn medications(&self) -> &SyncRepository<Medication> {
        &self.medications
    }

    pub fn observations(&self) -> &SyncRepository<Observation> {
        &self.observations
    }

    pub fn orders(&self) -> &OrderLifecycle {
        &self.orders
    }

    pub fn queue(&self) -> &dyn SyncQueue {
        self.queue.as_ref()
    }

    /// Local resident store, for queries that never hit the remote.
    pub fn resident_store(&self) -> &JsonStore<Resident> {
        &self.resident_store
    }

    pub fn medication_store(&self) -> &JsonStore<Medication> {
        &self.medication_store
    }

    pub fn observation_store(&self) -> &JsonStore<Observation> {
        &self.observation_store
    }

    pub async fn adjust_stock(&self, medication_id: Uuid, delta: i64) -> SyncResult<Option<u32>> {
        self.medication_store.adjust_stock(medication_id, delta).await
    }

    /// Replay the shared queue in enqueue order across every entity type.
    ///
    /// The batch stops at the first failure, so an observation never reaches
    /// the remote ahead of a resident that is still queued.
    pub async fn sync_all(&self) -> SyncResult<usize> {
        if !self.connectivity.is_online() {
            tracing::debug!("Offline, skipping replay");
            return Ok(0);
        }

        let targets: [&dyn ReplayTarget; 3] =
            [&self.residents, &self.medications, &self.observations];
        let replayed = replay_queue(self.queue.as_ref(), &targets).await?;
        let remaining = self.queue.get_all().await?.len();

        tracing::info!(replayed, remaining, "Replay finished");
        Ok(replayed)
    }
}

fn store<T: Record>(config: &SyncConfig) -> JsonStore<T> {
    JsonStore::new(StoreConfig::for_record::<T>(config))
}

fn repository<T: Record>(
    config: &SyncConfig,
    session: &Session,
    local: Arc<JsonStore<T>>,
    queue: Arc<JsonSyncQueue>,
    connectivity: Arc<dyn Connectivity>,
) -> SyncResult<SyncRepository<T>> {
    let remote = Arc::new(HttpRemote::<T>::new(config, session)?);
    Ok(SyncRepository::new(remote, local, queue, connectivity)
        .with_delete_policy(config.delete_policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::NetworkStatus;
    use crate::service::RecordService;
    use tempfile::TempDir;

    fn offline_hub(dir: &TempDir) -> CareHub {
        let config = SyncConfig {
            data_dir: dir.path().join("data"),
            ..SyncConfig::default()
        };
        CareHub::open(config, Arc::new(NetworkStatus::new(false))).unwrap()
    }

    #[tokio::test]
    async fn test_offline_writes_share_one_queue() {
        let dir = TempDir::new().unwrap();
        let hub = offline_hub(&dir);

        let resident = hub.residents().create(Resident::new("Mary", "Smith")).await.unwrap();
        hub.observations()
            .create(Observation::new(resident.id, "BP", "120/80"))
            .await
            .unwrap();

        let queued: Vec<_> = hub
            .queue()
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.entity_type)
            .collect();
        assert_eq!(queued, vec!["Resident", "Observation"]);
        assert_eq!(hub.sync_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_files_land_in_data_dir() {
        let dir = TempDir::new().unwrap();
        let hub = offline_hub(&dir);

        hub.medications().create(Medication::new("Metformin", 10, 5)).await.unwrap();
        assert!(dir.path().join("data").join("Medications.json").exists());
        assert!(dir.path().join("data").join("sync_queue.json").exists());
    }

    #[tokio::test]
    async fn test_seed_dir_feeds_first_load() {
        let dir = TempDir::new().unwrap();
        let seed_dir = dir.path().join("seed");
        std::fs::create_dir_all(&seed_dir).unwrap();
        std::fs::write(
            seed_dir.join("Inventory.json"),
            r#"[{"id":"6f1c2f7e-8a55-4d8e-9a39-0c2b7b0b6a11","medName":"Aspirin","stockQuantity":4,"reorderLevel":10}]"#,
        )
        .unwrap();

        let config = SyncConfig {
            data_dir: dir.path().join("data"),
            seed_dir: Some(seed_dir),
            ..SyncConfig::default()
        };
        let hub = CareHub::open(config, Arc::new(NetworkStatus::new(false))).unwrap();

        let low = hub.medication_store().low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(hub.adjust_stock(low[0].id, 20).await.unwrap(), Some(24));
    }
}
