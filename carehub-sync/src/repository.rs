//! Synchronizing repository
//!
//! One CRUD surface per entity type over three collaborators: the remote
//! authority, the local record store and the sync queue.
//!
//! - Reads prefer the remote when online and fall back to local on any failure
//! - Updates mirror remote successes locally, otherwise write locally only
//! - New records fall back to a local write plus a queued `Create` snapshot
//! - Deletes follow the configured [`DeletePolicy`], online or not
//! - [`replay_queue`] walks the shared queue oldest-first across entity types
//!   and stops at the first failure

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::config::DeletePolicy;
use crate::connectivity::Connectivity;
use crate::error::SyncResult;
use crate::record::Record;
use crate::service::RecordService;
use crate::sync_queue::{SyncOperation, SyncQueue, SyncQueueItem};

/// Sends queue items of one entity type to the remote authority.
#[async_trait]
pub trait ReplayTarget: Send + Sync {
    fn entity_type(&self) -> &'static str;

    async fn replay(&self, item: &SyncQueueItem) -> SyncResult<()>;
}

/// Replay the shared queue oldest-first, handing each item to the target
/// registered for its entity type.
///
/// The batch stops at the first failing item and at the first item no
/// target handles, so nothing is sent while an earlier item is still queued.
/// Failures are recorded on the item, never returned.
pub async fn replay_queue(queue: &dyn SyncQueue, targets: &[&dyn ReplayTarget]) -> SyncResult<usize> {
    let _batch = queue.replay_lock().lock().await;
    let items = queue.get_all().await?;
    let mut replayed = 0;

    for item in items {
        let Some(target) = targets.iter().find(|t| t.entity_type() == item.entity_type) else {
            tracing::debug!(
                queue_id = %item.id,
                entity_type = %item.entity_type,
                "No replay target for queued item, stopping batch"
            );
            break;
        };

        match target.replay(&item).await {
            Ok(()) => {
                queue.remove(item.id).await?;
                replayed += 1;
                tracing::debug!(
                    queue_id = %item.id,
                    entity_type = %item.entity_type,
                    entity_id = %item.entity_id,
                    operation = item.operation.as_str(),
                    "Replayed queued operation"
                );
            }
            Err(e) => {
                tracing::warn!(
                    queue_id = %item.id,
                    entity_type = %item.entity_type,
                    attempt_count = item.attempt_count + 1,
                    error = %e,
                    "Replay failed, stopping batch"
                );
                queue.record_failure(item.id, &e.to_string()).await?;
                break;
            }
        }
    }

    if replayed > 0 {
        tracing::info!(replayed, "Sync completed");
    }
    Ok(replayed)
}

pub struct SyncRepository<T: Record> {
    remote: Arc<dyn RecordService<T>>,
    local: Arc<dyn RecordService<T>>,
    queue: Arc<dyn SyncQueue>,
    connectivity: Arc<dyn Connectivity>,
    delete_policy: DeletePolicy,
}

impl<T: Record> SyncRepository<T> {
    pub fn new(
        remote: Arc<dyn RecordService<T>>,
        local: Arc<dyn RecordService<T>>,
        queue: Arc<dyn SyncQueue>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            remote,
            local,
            queue,
            connectivity,
            delete_policy: DeletePolicy::default(),
        }
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn delete_policy(&self) -> DeletePolicy {
        self.delete_policy
    }

    /// Replay queued mutations while only this entity type is known.
    ///
    /// Stops at the first item of another type; use
    /// [`CareHub::sync_all`](crate::hub::CareHub::sync_all) to replay a
    /// queue shared between types.
    pub async fn sync(&self) -> SyncResult<usize> {
        if !self.connectivity.is_online() {
            tracing::debug!(entity_type = T::ENTITY_TYPE, "Offline, skipping replay");
            return Ok(0);
        }
        replay_queue(self.queue.as_ref(), &[self as &dyn ReplayTarget]).await
    }

    async fn enqueue(&self, record: &T, operation: SyncOperation) -> SyncResult<()> {
        let item = SyncQueueItem::snapshot(record, operation)?;
        self.queue.enqueue(item).await?;
        Ok(())
    }

    /// Apply the delete policy to a record whose Create is still queued.
    ///
    /// Returns true when the queue now accounts for the delete, so the
    /// remote must not be called directly. Caller holds the replay lock.
    async fn settle_pending_create(&self, record: &T) -> SyncResult<bool> {
        if self.delete_policy == DeletePolicy::LocalOnly {
            return Ok(false);
        }
        let pending: Vec<_> = self
            .queue
            .pending_for(T::ENTITY_TYPE, record.id())
            .await?
            .into_iter()
            .filter(|item| item.operation == SyncOperation::Create)
            .collect();
        if pending.is_empty() {
            return Ok(false);
        }

        match self.delete_policy {
            DeletePolicy::LocalOnly => {}
            DeletePolicy::SuppressPendingCreate => {
                for item in &pending {
                    self.queue.remove(item.id).await?;
                    tracing::info!(
                        queue_id = %item.id,
                        entity_type = T::ENTITY_TYPE,
                        record_id = %record.id(),
                        "Suppressed pending create for deleted record"
                    );
                }
            }
            DeletePolicy::QueueDelete => {
                self.enqueue(record, SyncOperation::Delete).await?;
            }
        }
        Ok(true)
    }

    /// Local delete for a record the remote may still hold.
    async fn delete_offline(&self, record: &T) -> SyncResult<()> {
        if self.delete_policy == DeletePolicy::QueueDelete {
            self.enqueue(record, SyncOperation::Delete).await?;
        }
        self.local.delete(record).await
    }
}

#[async_trait]
impl<T: Record> ReplayTarget for SyncRepository<T> {
    fn entity_type(&self) -> &'static str {
        T::ENTITY_TYPE
    }

    async fn replay(&self, item: &SyncQueueItem) -> SyncResult<()> {
        let record: T = serde_json::from_str(&item.payload)?;
        match item.operation {
            SyncOperation::Create => self.remote.create(record).await.map(|_| ()),
            SyncOperation::Delete => self.remote.delete(&record).await,
        }
    }
}

#[async_trait]
impl<T: Record> RecordService<T> for SyncRepository<T> {
    async fn load_all(&self) -> SyncResult<Vec<T>> {
        if self.connectivity.is_online() {
            match self.remote.load_all().await {
                Ok(items) => return Ok(items),
                Err(e) => tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    error = %e,
                    "Remote read failed, serving local copy"
                ),
            }
        }
        self.local.load_all().await
    }

    async fn create(&self, mut record: T) -> SyncResult<T> {
        record.validate()?;
        record.stamp_recorded_at(Utc::now());
        record.ensure_id();

        if self.connectivity.is_online() {
            match self.remote.create(record.clone()).await {
                Ok(created) => return self.local.update(created).await,
                Err(e) => tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    record_id = %record.id(),
                    error = %e,
                    "Remote create failed, queuing for replay"
                ),
            }
        }

        // Local first so the record is visible even if queuing is interrupted.
        let saved = self.local.create(record).await?;
        self.enqueue(&saved, SyncOperation::Create).await?;
        Ok(saved)
    }

    async fn update(&self, record: T) -> SyncResult<T> {
        if !record.has_id() {
            return self.create(record).await;
        }
        record.validate()?;

        if self.connectivity.is_online() {
            match self.remote.update(record.clone()).await {
                Ok(updated) => return self.local.update(updated).await,
                Err(e) => tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    record_id = %record.id(),
                    error = %e,
                    "Remote update failed, writing locally only"
                ),
            }
        }
        self.local.update(record).await
    }

    async fn delete(&self, record: &T) -> SyncResult<()> {
        let _queue = self.queue.replay_lock().lock().await;

        if self.settle_pending_create(record).await? {
            return self.local.delete(record).await;
        }

        if self.connectivity.is_online() {
            match self.remote.delete(record).await {
                Ok(()) => return self.local.delete(record).await,
                Err(e) => tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    record_id = %record.id(),
                    error = %e,
                    "Remote delete failed"
                ),
            }
        }
        self.delete_offline(record).await
    }
}
