//! Medication order lifecycle
//!
//! ```text
//! Requested -> Ordered   | Requested -> Cancelled
//! Ordered   -> Received  | Ordered   -> Cancelled
//! ```
//!
//! `Received` and `Cancelled` are terminal. Entering `Received` credits the
//! medication's stock by the requested quantity exactly once.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::config::Session;
use crate::error::{SyncError, SyncResult};
use crate::inventory::StockLedger;
use crate::models::{MedicationOrder, OrderStatus};
use crate::store::JsonStore;

/// Why a status change was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotFound,
    AlreadyInStatus,
    NotAllowed { from: OrderStatus, to: OrderStatus },
}

/// Result of [`OrderLifecycle::update_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied { from: OrderStatus, to: OrderStatus },
    Rejected(RejectReason),
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Fields for a new order
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub medication_id: Uuid,
    pub requested_quantity: i64,
    /// Falls back to the session operator when blank
    pub requested_by: Option<String>,
    pub notes: Option<String>,
}

/// Local-only order manager. The order store lock serialises every
/// transition, so concurrent calls observe each other's status.
pub struct OrderLifecycle {
    orders: Arc<JsonStore<MedicationOrder>>,
    stock: Arc<dyn StockLedger>,
    session: Session,
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<JsonStore<MedicationOrder>>,
        stock: Arc<dyn StockLedger>,
        session: Session,
    ) -> Self {
        Self {
            orders,
            stock,
            session,
        }
    }

    pub async fn load_all(&self) -> SyncResult<Vec<MedicationOrder>> {
        self.orders.load_all().await
    }

    pub async fn get(&self, order_id: Uuid) -> SyncResult<Option<MedicationOrder>> {
        self.orders.get(order_id).await
    }

    pub async fn by_medication(&self, medication_id: Uuid) -> SyncResult<Vec<MedicationOrder>> {
        self.orders.by_medication(medication_id).await
    }

    /// Create an order in `Requested`.
    pub async fn create_order(&self, new: NewOrder) -> SyncResult<MedicationOrder> {
        let requested_quantity = u32::try_from(new.requested_quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| SyncError::validation("Requested quantity must be greater than zero"))?;

        let requested_by = new
            .requested_by
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.session.operator.clone());

        let order = MedicationOrder {
            id: Uuid::new_v4(),
            medication_id: new.medication_id,
            requested_quantity,
            status: OrderStatus::Requested,
            requested_at: Utc::now(),
            requested_by,
            ordered_at: None,
            ordered_by: None,
            received_at: None,
            received_by: None,
            cancelled_at: None,
            cancelled_by: None,
            notes: new.notes.filter(|n| !n.trim().is_empty()),
        };

        let order = self.orders.upsert(order).await?;
        tracing::info!(
            order_id = %order.id,
            medication_id = %order.medication_id,
            requested_quantity = order.requested_quantity,
            "Created medication order"
        );
        Ok(order)
    }

    /// Move an order to `to` if the lifecycle allows it.
    ///
    /// Rejected transitions change nothing. Stock is credited before the
    /// order is saved and reversed if the save fails.
    pub async fn update_status(&self, order_id: Uuid, to: OrderStatus) -> SyncResult<TransitionOutcome> {
        let guard = self.orders.lock().await;
        let mut orders = guard.load().await;

        let Some(order) = orders.iter_mut().find(|o| o.id == order_id) else {
            return Ok(TransitionOutcome::Rejected(RejectReason::NotFound));
        };

        let from = order.status;
        if from == to {
            return Ok(TransitionOutcome::Rejected(RejectReason::AlreadyInStatus));
        }
        if !from.can_transition_to(to) {
            tracing::debug!(%order_id, %from, %to, "Ignoring disallowed order transition");
            return Ok(TransitionOutcome::Rejected(RejectReason::NotAllowed { from, to }));
        }

        let now = Utc::now();
        let operator = &self.session.operator;
        order.status = to;
        match to {
            OrderStatus::Ordered => {
                order.ordered_at.get_or_insert(now);
                order.ordered_by.get_or_insert_with(|| operator.clone());
            }
            OrderStatus::Received => {
                order.received_at.get_or_insert(now);
                order.received_by.get_or_insert_with(|| operator.clone());
            }
            OrderStatus::Cancelled => {
                order.cancelled_at.get_or_insert(now);
                order.cancelled_by.get_or_insert_with(|| operator.clone());
            }
            OrderStatus::Requested => {}
        }

        let medication_id = order.medication_id;
        let credit = (to == OrderStatus::Received && from != OrderStatus::Received)
            .then(|| i64::from(order.requested_quantity));

        if let Some(delta) = credit {
            if self.stock.adjust_stock(medication_id, delta).await?.is_none() {
                tracing::warn!(%order_id, %medication_id, "Received order for unknown medication");
            }
        }

        if let Err(e) = guard.save(&orders).await {
            if let Some(delta) = credit {
                if let Err(undo) = self.stock.adjust_stock(medication_id, -delta).await {
                    tracing::error!(
                        %order_id,
                        %medication_id,
                        delta,
                        error = %undo,
                        "Could not reverse stock credit after failed order save"
                    );
                }
            }
            return Err(e);
        }

        tracing::info!(%order_id, %from, %to, "Order status changed");
        Ok(TransitionOutcome::Applied { from, to })
    }

    /// Remove an order. Inventory is not touched.
    pub async fn delete(&self, order_id: Uuid) -> SyncResult<bool> {
        self.orders.delete_by_id(order_id).await
    }
}
