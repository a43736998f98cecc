//! The CRUD surface shared by local stores, the remote authority and the
//! synchronizing repository.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::record::Record;

#[async_trait]
pub trait RecordService<T: Record>: Send + Sync {
    async fn load_all(&self) -> SyncResult<Vec<T>>;

    /// Persist a record that has not been stored before.
    async fn create(&self, record: T) -> SyncResult<T>;

    /// Fully replace an identified record.
    async fn update(&self, record: T) -> SyncResult<T>;

    async fn delete(&self, record: &T) -> SyncResult<()>;

    /// `create` for records without an id, `update` otherwise.
    async fn upsert(&self, record: T) -> SyncResult<T> {
        if record.has_id() {
            self.update(record).await
        } else {
            self.create(record).await
        }
    }
}
