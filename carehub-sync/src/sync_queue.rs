//! Durable queue of mutations awaiting replay to the remote authority

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::record::Record;
use crate::store::JsonStore;

/// Mutation kind carried by a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncOperation {
    Create,
    Delete,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Create => "Create",
            SyncOperation::Delete => "Delete",
        }
    }
}

/// One pending remote mutation with a full snapshot of the record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub entity_id: Uuid,
    pub operation: SyncOperation,
    /// Serialized record snapshot
    pub payload: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub last_error: String,
    /// Enqueue order
    #[serde(default)]
    pub sequence: u64,
}

impl SyncQueueItem {
    /// Snapshot `record` for replay.
    pub fn snapshot<T: Record>(record: &T, operation: SyncOperation) -> SyncResult<Self> {
        Ok(Self {
            id: Uuid::nil(),
            entity_type: T::ENTITY_TYPE.to_string(),
            entity_id: record.id(),
            operation,
            payload: serde_json::to_string(record)?,
            created_at: Utc::now(),
            attempt_count: 0,
            last_error: String::new(),
            sequence: 0,
        })
    }

    pub fn is_for<T: Record>(&self) -> bool {
        self.entity_type == T::ENTITY_TYPE
    }
}

impl Record for SyncQueueItem {
    const ENTITY_TYPE: &'static str = "SyncQueueItem";
    const FILE_NAME: &'static str = "sync_queue.json";
    const SEED_FILE: Option<&'static str> = None;
    const API_PATH: &'static str = "";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }
}

#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// All items in enqueue order.
    async fn get_all(&self) -> SyncResult<Vec<SyncQueueItem>>;

    /// Append an item, assigning its queue id, sequence and queuing time.
    async fn enqueue(&self, item: SyncQueueItem) -> SyncResult<SyncQueueItem>;

    /// Returns whether an item was removed.
    async fn remove(&self, queue_id: Uuid) -> SyncResult<bool>;

    async fn clear(&self) -> SyncResult<()>;

    /// Bump the attempt count and store the error text of a failed replay.
    async fn record_failure(&self, queue_id: Uuid, error: &str) -> SyncResult<()>;

    /// Held for a whole replay batch and while a delete edits queued items.
    fn replay_lock(&self) -> &Mutex<()>;

    /// Queued items for one record, in enqueue order.
    async fn pending_for(&self, entity_type: &str, entity_id: Uuid) -> SyncResult<Vec<SyncQueueItem>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|item| item.entity_type == entity_type && item.entity_id == entity_id)
            .collect())
    }
}

/// Sync queue persisted as a JSON record store
pub struct JsonSyncQueue {
    store: JsonStore<SyncQueueItem>,
    replay_lock: Mutex<()>,
}

impl JsonSyncQueue {
    pub fn new(store: JsonStore<SyncQueueItem>) -> Self {
        Self {
            store,
            replay_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl SyncQueue for JsonSyncQueue {
    async fn get_all(&self) -> SyncResult<Vec<SyncQueueItem>> {
        let mut items = self.store.load_all().await?;
        items.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(items)
    }

    async fn enqueue(&self, mut item: SyncQueueItem) -> SyncResult<SyncQueueItem> {
        item.id = Uuid::new_v4();
        item.created_at = Utc::now();

        let item = self
            .store
            .modify(move |items| {
                item.sequence = items.iter().map(|i| i.sequence).max().unwrap_or(0) + 1;
                items.push(item.clone());
                item
            })
            .await?;

        tracing::debug!(
            queue_id = %item.id,
            entity_type = %item.entity_type,
            entity_id = %item.entity_id,
            operation = item.operation.as_str(),
            sequence = item.sequence,
            "Queued operation for replay"
        );
        Ok(item)
    }

    async fn remove(&self, queue_id: Uuid) -> SyncResult<bool> {
        self.store.delete_by_id(queue_id).await
    }

    async fn clear(&self) -> SyncResult<()> {
        self.store.replace_all(&[]).await?;
        tracing::info!("Cleared sync queue");
        Ok(())
    }

    async fn record_failure(&self, queue_id: Uuid, error: &str) -> SyncResult<()> {
        let error = error.to_string();
        let attempt_count = self
            .store
            .modify(move |items| {
                items.iter_mut().find(|i| i.id == queue_id).map(|item| {
                    item.attempt_count += 1;
                    item.last_error = error;
                    item.attempt_count
                })
            })
            .await?;

        tracing::debug!(%queue_id, ?attempt_count, "Recorded replay failure");
        Ok(())
    }

    fn replay_lock(&self) -> &Mutex<()> {
        &self.replay_lock
    }
}
