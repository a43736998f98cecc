//! Medication order lifecycle tests
//!
//! 1. Full restock scenario: request, order, receive, receive again
//! 2. Illegal transitions leave status, timestamps and stock alone
//! 3. A failed order save never leaves inventory credited
//! 4. Stock adjustment clamps at zero for any input

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use carehub_sync::*;
use proptest::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    _dir: TempDir,
    medications: Arc<JsonStore<Medication>>,
    lifecycle: OrderLifecycle,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let medications = Arc::new(JsonStore::new(StoreConfig::new(
        dir.path().join(Medication::FILE_NAME),
    )));
    let orders = Arc::new(JsonStore::new(StoreConfig::new(
        dir.path().join(MedicationOrder::FILE_NAME),
    )));
    let lifecycle = OrderLifecycle::new(orders, medications.clone(), Session::default());
    Harness {
        _dir: dir,
        medications,
        lifecycle,
    }
}

async fn stock_of(store: &JsonStore<Medication>, id: Uuid) -> u32 {
    store.get(id).await.unwrap().unwrap().stock_quantity
}

fn order_for(medication_id: Uuid, quantity: i64) -> NewOrder {
    NewOrder {
        medication_id,
        requested_quantity: quantity,
        ..Default::default()
    }
}

// ============================================================================
// TEST 1: Restock scenario
// ============================================================================

#[tokio::test]
async fn test_restock_credits_inventory_once() {
    let h = harness();
    let med = h
        .medications
        .upsert(Medication::new("Metformin", 10, 15))
        .await
        .unwrap();
    assert!(med.is_low_stock());

    let order = h.lifecycle.create_order(order_for(med.id, 30)).await.unwrap();
    assert_eq!(order.status, OrderStatus::Requested);
    assert_eq!(order.requested_by, "Staff");

    let outcome = h.lifecycle.update_status(order.id, OrderStatus::Ordered).await.unwrap();
    assert!(outcome.is_applied());
    let ordered = h.lifecycle.get(order.id).await.unwrap().unwrap();
    assert!(ordered.ordered_at.is_some());
    assert_eq!(ordered.ordered_by.as_deref(), Some("Staff"));
    assert_eq!(stock_of(&h.medications, med.id).await, 10);

    let outcome = h.lifecycle.update_status(order.id, OrderStatus::Received).await.unwrap();
    assert_eq!(
        outcome,
        TransitionOutcome::Applied {
            from: OrderStatus::Ordered,
            to: OrderStatus::Received
        }
    );
    let received = h.lifecycle.get(order.id).await.unwrap().unwrap();
    assert!(received.received_at.is_some());
    assert_eq!(stock_of(&h.medications, med.id).await, 40);

    let outcome = h.lifecycle.update_status(order.id, OrderStatus::Received).await.unwrap();
    assert_eq!(outcome, TransitionOutcome::Rejected(RejectReason::AlreadyInStatus));
    assert_eq!(stock_of(&h.medications, med.id).await, 40);
    assert_eq!(h.lifecycle.get(order.id).await.unwrap().unwrap(), received);

    assert!(h.medications.low_stock().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_receives_credit_once() {
    let h = Arc::new(harness());
    let med = h.medications.upsert(Medication::new("Insulin", 0, 5)).await.unwrap();
    let order = h.lifecycle.create_order(order_for(med.id, 12)).await.unwrap();
    h.lifecycle.update_status(order.id, OrderStatus::Ordered).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.lifecycle.update_status(order.id, OrderStatus::Received).await.unwrap()
        }));
    }
    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap().is_applied() {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(stock_of(&h.medications, med.id).await, 12);
}

// ============================================================================
// TEST 2: Illegal transitions
// ============================================================================

#[tokio::test]
async fn test_cancelled_order_cannot_be_reordered() {
    let h = harness();
    let med = h.medications.upsert(Medication::new("Warfarin", 7, 5)).await.unwrap();
    let order = h.lifecycle.create_order(order_for(med.id, 3)).await.unwrap();
    h.lifecycle.update_status(order.id, OrderStatus::Cancelled).await.unwrap();
    let cancelled = h.lifecycle.get(order.id).await.unwrap().unwrap();

    for target in [OrderStatus::Ordered, OrderStatus::Received, OrderStatus::Requested] {
        let outcome = h.lifecycle.update_status(order.id, target).await.unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Rejected(RejectReason::NotAllowed {
                from: OrderStatus::Cancelled,
                to: target
            })
        );
    }

    assert_eq!(h.lifecycle.get(order.id).await.unwrap().unwrap(), cancelled);
    assert!(cancelled.ordered_at.is_none());
    assert_eq!(stock_of(&h.medications, med.id).await, 7);
}

#[tokio::test]
async fn test_received_order_cannot_be_cancelled() {
    let h = harness();
    let med = h.medications.upsert(Medication::new("Aspirin", 1, 5)).await.unwrap();
    let order = h.lifecycle.create_order(order_for(med.id, 10)).await.unwrap();
    h.lifecycle.update_status(order.id, OrderStatus::Ordered).await.unwrap();
    h.lifecycle.update_status(order.id, OrderStatus::Received).await.unwrap();

    let outcome = h.lifecycle.update_status(order.id, OrderStatus::Cancelled).await.unwrap();
    assert!(!outcome.is_applied());
    let stored = h.lifecycle.get(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Received);
    assert!(stored.cancelled_at.is_none());
    assert_eq!(stock_of(&h.medications, med.id).await, 11);
}

#[tokio::test]
async fn test_legacy_order_file_is_readable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(MedicationOrder::FILE_NAME);
    let medication_id = Uuid::new_v4();
    let order_id = Uuid::new_v4();
    std::fs::write(
        &path,
        format!(
            r#"[{{"id":"{}","medicationId":"{}","requestedQuantity":5,"status":"Pending to Stock In","requestedAt":"2024-01-05T09:00:00Z","requestedBy":"Day shift"}}]"#,
            order_id, medication_id
        ),
    )
    .unwrap();

    let medications = Arc::new(JsonStore::new(StoreConfig::new(
        dir.path().join(Medication::FILE_NAME),
    )));
    let mut med = Medication::new("Donepezil", 2, 5);
    med.id = medication_id;
    medications.upsert(med).await.unwrap();

    let lifecycle = OrderLifecycle::new(
        Arc::new(JsonStore::new(StoreConfig::new(&path))),
        medications.clone(),
        Session::default(),
    );

    let order = lifecycle.get(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Ordered);

    lifecycle.update_status(order_id, OrderStatus::Received).await.unwrap();
    assert_eq!(stock_of(&medications, medication_id).await, 7);

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains(r#""status": "Received""#));
}

// ============================================================================
// TEST 3: Compensation when the order cannot be saved
// ============================================================================

/// Ledger that breaks the order file right after crediting stock.
struct SabotagingLedger {
    inner: Arc<JsonStore<Medication>>,
    orders_path: PathBuf,
}

#[async_trait]
impl StockLedger for SabotagingLedger {
    async fn adjust_stock(&self, medication_id: Uuid, delta: i64) -> SyncResult<Option<u32>> {
        let result = self.inner.adjust_stock(medication_id, delta).await;
        if delta > 0 {
            std::fs::remove_file(&self.orders_path).unwrap();
            std::fs::create_dir(&self.orders_path).unwrap();
            std::fs::write(self.orders_path.join("blocker"), "x").unwrap();
        }
        result
    }
}

#[tokio::test]
async fn test_failed_save_reverses_stock_credit() {
    let dir = TempDir::new().unwrap();
    let medications = Arc::new(JsonStore::new(StoreConfig::new(
        dir.path().join(Medication::FILE_NAME),
    )));
    let orders_path = dir.path().join(MedicationOrder::FILE_NAME);
    let mut orders_config = StoreConfig::new(&orders_path);
    orders_config.retry_delay = Duration::from_millis(1);

    let lifecycle = OrderLifecycle::new(
        Arc::new(JsonStore::new(orders_config)),
        Arc::new(SabotagingLedger {
            inner: medications.clone(),
            orders_path: orders_path.clone(),
        }),
        Session::default(),
    );

    let med = medications.upsert(Medication::new("Heparin", 4, 5)).await.unwrap();
    let order = lifecycle.create_order(order_for(med.id, 20)).await.unwrap();
    lifecycle.update_status(order.id, OrderStatus::Ordered).await.unwrap();

    let result = lifecycle.update_status(order.id, OrderStatus::Received).await;
    assert!(matches!(result, Err(SyncError::Storage(_))));
    assert_eq!(stock_of(&medications, med.id).await, 4);
}

// ============================================================================
// TEST 4: Clamped stock property
// ============================================================================

proptest! {
    #[test]
    fn prop_clamp_stock_never_negative(stock in 0u32..1_000_000, delta in -2_000_000i64..2_000_000) {
        let expected = (i64::from(stock) + delta).max(0);
        prop_assert_eq!(i64::from(clamp_stock(stock, delta)), expected);
    }

    #[test]
    fn prop_adjust_stock_matches_clamp(stock in 0u32..10_000, delta in -20_000i64..20_000) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let adjusted = rt.block_on(async {
            let dir = TempDir::new().unwrap();
            let store = JsonStore::new(StoreConfig::new(dir.path().join(Medication::FILE_NAME)));
            let med = store.upsert(Medication::new("Prop", stock, 0)).await.unwrap();
            store.adjust_stock(med.id, delta).await.unwrap()
        });
        prop_assert_eq!(adjusted, Some(u32::try_from((i64::from(stock) + delta).max(0)).unwrap()));
    }
}
