//! File-backed record store for offline-first operation
//!
//! Provides:
//! - One pretty-printed JSON array per entity type, rewritten in full
//! - Copy-once seeding from a bundled template
//! - Corrupt-file quarantine and recovery
//! - Exclusive locking around every read-modify-write cycle
//! - Bounded retries for transient write failures

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::record::Record;
use crate::service::RecordService;

/// Configuration for a single store file
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Writable JSON file
    pub path: PathBuf,
    /// Read-only template copied on first load
    pub seed_path: Option<PathBuf>,
    /// Attempts per write before the failure is surfaced
    pub write_retries: u32,
    /// Pause between write attempts
    pub retry_delay: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            seed_path: None,
            write_retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }

    pub fn with_seed(mut self, seed_path: impl Into<PathBuf>) -> Self {
        self.seed_path = Some(seed_path.into());
        self
    }

    /// Store settings for `T` under the configured data and seed directories.
    pub fn for_record<T: Record>(config: &SyncConfig) -> Self {
        let seed_path = match (&config.seed_dir, T::SEED_FILE) {
            (Some(dir), Some(file)) => Some(dir.join(file)),
            _ => None,
        };
        Self {
            path: config.data_dir.join(T::FILE_NAME),
            seed_path,
            write_retries: config.write_retries.max(1),
            retry_delay: config.write_retry_delay,
        }
    }
}

/// Durable keyed collection of `T` on this device
pub struct JsonStore<T: Record> {
    config: StoreConfig,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

/// Exclusive access to a store's file for one read-modify-write cycle.
///
/// The lock is released when the guard is dropped, on every exit path.
pub struct StoreGuard<'a, T: Record> {
    store: &'a JsonStore<T>,
    _guard: MutexGuard<'a, ()>,
}

impl<T: Record> StoreGuard<'_, T> {
    pub async fn load(&self) -> Vec<T> {
        self.store.read_unlocked().await
    }

    pub async fn save(&self, items: &[T]) -> SyncResult<()> {
        self.store.write_unlocked(items).await
    }
}

impl<T: Record> JsonStore<T> {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Take the store lock for a multi-step update.
    pub async fn lock(&self) -> StoreGuard<'_, T> {
        StoreGuard {
            store: self,
            _guard: self.lock.lock().await,
        }
    }

    /// All records. Never fails: unreadable files yield an empty collection.
    pub async fn load_all(&self) -> SyncResult<Vec<T>> {
        let guard = self.lock().await;
        Ok(guard.load().await)
    }

    pub async fn get(&self, id: Uuid) -> SyncResult<Option<T>> {
        let items = self.load_all().await?;
        Ok(items.into_iter().find(|item| item.id() == id))
    }

    /// Insert or fully replace a record, assigning an id when absent.
    pub async fn upsert(&self, mut record: T) -> SyncResult<T> {
        record.validate()?;
        let id = record.ensure_id();

        let guard = self.lock().await;
        let mut items = guard.load().await;
        items.retain(|item| item.id() != id);
        items.push(record.clone());
        guard.save(&items).await?;

        tracing::debug!(
            entity_type = T::ENTITY_TYPE,
            record_id = %id,
            count = items.len(),
            "Upserted local record"
        );
        Ok(record)
    }

    /// Remove the record with `id`. Returns whether anything was removed.
    pub async fn delete_by_id(&self, id: Uuid) -> SyncResult<bool> {
        let guard = self.lock().await;
        let mut items = guard.load().await;
        let before = items.len();
        items.retain(|item| item.id() != id);
        let removed = items.len() != before;
        if removed {
            guard.save(&items).await?;
        }

        tracing::debug!(
            entity_type = T::ENTITY_TYPE,
            record_id = %id,
            removed,
            "Deleted local record"
        );
        Ok(removed)
    }

    /// Run `f` over the collection under the lock and persist the result.
    pub async fn modify<R, F>(&self, f: F) -> SyncResult<R>
    where
        F: FnOnce(&mut Vec<T>) -> R + Send,
    {
        let guard = self.lock().await;
        let mut items = guard.load().await;
        let result = f(&mut items);
        guard.save(&items).await?;
        Ok(result)
    }

    /// Replace the whole collection.
    pub async fn replace_all(&self, items: &[T]) -> SyncResult<()> {
        let guard = self.lock().await;
        guard.save(items).await
    }

    async fn ensure_seeded(&self) {
        let path = &self.config.path;
        match tokio::fs::try_exists(path).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not stat store file");
                return;
            }
        }

        if let Err(e) = self.reseed().await {
            tracing::warn!(
                entity_type = T::ENTITY_TYPE,
                path = %path.display(),
                error = %e,
                "Seeding store failed"
            );
        }
    }

    /// Copy the template into place, or start an empty collection when
    /// there is no usable template.
    async fn reseed(&self) -> SyncResult<()> {
        let path = &self.config.path;
        ensure_parent(path).await?;

        if let Some(seed) = &self.config.seed_path {
            match tokio::fs::copy(seed, path).await {
                Ok(bytes) => {
                    tracing::info!(
                        entity_type = T::ENTITY_TYPE,
                        seed = %seed.display(),
                        bytes,
                        "Seeded store from template"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        entity_type = T::ENTITY_TYPE,
                        seed = %seed.display(),
                        error = %e,
                        "Seed template unavailable, starting empty"
                    );
                }
            }
        }

        self.write_text(b"[]").await
    }

    async fn read_unlocked(&self) -> Vec<T> {
        self.ensure_seeded().await;

        let path = &self.config.path;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    path = %path.display(),
                    error = %e,
                    "Local read failed, returning empty collection"
                );
                return Vec::new();
            }
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            if let Err(e) = self.write_text(b"[]").await {
                tracing::warn!(path = %path.display(), error = %e, "Could not reset empty store file");
            }
            return Vec::new();
        }

        match serde_json::from_slice::<Vec<T>>(&bytes) {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(
                    entity_type = T::ENTITY_TYPE,
                    path = %path.display(),
                    error = %e,
                    "Store file is corrupt, recovering"
                );
                self.recover_from_corruption().await
            }
        }
    }

    async fn recover_from_corruption(&self) -> Vec<T> {
        let path = &self.config.path;
        let backup = corrupt_backup_path(path);
        match tokio::fs::copy(path, &backup).await {
            Ok(_) => tracing::warn!(backup = %backup.display(), "Preserved corrupt store file"),
            Err(e) => tracing::warn!(error = %e, "Could not preserve corrupt store file"),
        }

        if let Err(e) = self.reseed().await {
            tracing::warn!(error = %e, "Re-seeding after corruption failed");
            return Vec::new();
        }

        let reread = tokio::fs::read(path)
            .await
            .map_err(SyncError::from)
            .and_then(|bytes| serde_json::from_slice::<Vec<T>>(&bytes).map_err(SyncError::from));

        match reread {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "Seed template unusable, resetting to empty collection");
                if let Err(e) = self.write_text(b"[]").await {
                    tracing::warn!(error = %e, "Could not reset store file");
                }
                Vec::new()
            }
        }
    }

    async fn write_unlocked(&self, items: &[T]) -> SyncResult<()> {
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| SyncError::Serialization(e.to_string()))?;
        self.write_text(&json).await
    }

    /// Write the full file through a temp file and rename, retrying
    /// transient failures a bounded number of times.
    async fn write_text(&self, contents: &[u8]) -> SyncResult<()> {
        let path = &self.config.path;
        let attempts = self.config.write_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match write_atomic(path, contents).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(
                        entity_type = T::ENTITY_TYPE,
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "Local write failed"
                    );
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        let error = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::error!(
            entity_type = T::ENTITY_TYPE,
            path = %path.display(),
            attempts,
            "Giving up on local write"
        );
        Err(SyncError::Storage(format!(
            "Could not write {} after {} attempts: {}",
            path.display(),
            attempts,
            error
        )))
    }
}

#[async_trait]
impl<T: Record> RecordService<T> for JsonStore<T> {
    async fn load_all(&self) -> SyncResult<Vec<T>> {
        JsonStore::load_all(self).await
    }

    async fn create(&self, record: T) -> SyncResult<T> {
        self.upsert(record).await
    }

    async fn update(&self, record: T) -> SyncResult<T> {
        self.upsert(record).await
    }

    async fn delete(&self, record: &T) -> SyncResult<()> {
        self.delete_by_id(record.id()).await.map(|_| ())
    }
}

async fn ensure_parent(path: &Path) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = sibling_path(path, ".tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// `<file>.corrupt_YYYYMMDD_HHMMSS` next to the store file.
pub fn corrupt_backup_path(path: &Path) -> PathBuf {
    sibling_path(path, &format!(".corrupt_{}", Local::now().format("%Y%m%d_%H%M%S")))
}
