//! Offline-first record synchronization for CareHub
//!
//! Provides:
//! - File-backed JSON record stores with seeding and corruption recovery
//! - A durable sync queue replayed oldest-first once the remote is reachable
//! - Synchronizing repositories routing every call to remote, local or queue
//! - The medication order lifecycle and its inventory side effect

pub mod config;
pub mod connectivity;
pub mod error;
pub mod hub;
pub mod inventory;
pub mod models;
pub mod orders;
pub mod record;
pub mod remote;
pub mod repository;
pub mod service;
pub mod store;
pub mod sync_queue;

pub use config::{DeletePolicy, Session, SyncConfig};
pub use connectivity::{Connectivity, NetworkStatus};
pub use error::{SyncError, SyncResult};
pub use hub::CareHub;
pub use inventory::StockLedger;
pub use models::{
    clamp_stock, parse_legacy_status, EmergencyContact, Medication, MedicationOrder, Observation,
    OrderStatus, Resident,
};
pub use orders::{NewOrder, OrderLifecycle, RejectReason, TransitionOutcome};
pub use record::Record;
pub use remote::HttpRemote;
pub use repository::{replay_queue, ReplayTarget, SyncRepository};
pub use service::RecordService;
pub use store::{JsonStore, StoreConfig};
pub use sync_queue::{JsonSyncQueue, SyncOperation, SyncQueue, SyncQueueItem};
