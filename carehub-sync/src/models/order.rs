//! Medication reorder models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::record::Record;

/// Lifecycle status of a medication order.
///
/// `Received` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Requested,
    Ordered,
    Received,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Requested => "Requested",
            OrderStatus::Ordered => "Ordered",
            OrderStatus::Received => "Received",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Received | OrderStatus::Cancelled)
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Requested, OrderStatus::Ordered)
                | (OrderStatus::Requested, OrderStatus::Cancelled)
                | (OrderStatus::Ordered, OrderStatus::Received)
                | (OrderStatus::Ordered, OrderStatus::Cancelled)
        )
    }

    fn from_index(index: i64) -> Self {
        match index {
            1 => OrderStatus::Ordered,
            2 => OrderStatus::Received,
            3 => OrderStatus::Cancelled,
            _ => OrderStatus::Requested,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compatibility shim for status labels written by earlier releases.
///
/// Recognises the enum names in any case plus the old UI labels
/// "Pending to Order", "Pending to Stock In", "Completed" and the
/// "Canceled" spelling. Unknown input maps to `Requested`.
pub fn parse_legacy_status(raw: &str) -> OrderStatus {
    match raw.trim().to_lowercase().as_str() {
        "requested" | "pending to order" => OrderStatus::Requested,
        "ordered" | "pending to stock in" => OrderStatus::Ordered,
        "received" | "completed" => OrderStatus::Received,
        "cancelled" | "canceled" => OrderStatus::Cancelled,
        numeric => numeric
            .parse::<i64>()
            .map(OrderStatus::from_index)
            .unwrap_or(OrderStatus::Requested),
    }
}

/// Strict parse for operator input: names and legacy labels only.
impl FromStr for OrderStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "requested" | "pending to order" => Ok(OrderStatus::Requested),
            "ordered" | "pending to stock in" => Ok(OrderStatus::Ordered),
            "received" | "completed" => Ok(OrderStatus::Received),
            "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
            other => Err(SyncError::validation(format!(
                "Unknown order status: {}. Valid options: Requested, Ordered, Received, Cancelled",
                other
            ))),
        }
    }
}

impl Serialize for OrderStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = OrderStatus;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an order status name, legacy label or index")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<OrderStatus, E> {
                Ok(parse_legacy_status(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<OrderStatus, E> {
                Ok(OrderStatus::from_index(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<OrderStatus, E> {
                Ok(i64::try_from(v).map(OrderStatus::from_index).unwrap_or(OrderStatus::Requested))
            }

            fn visit_unit<E: de::Error>(self) -> Result<OrderStatus, E> {
                Ok(OrderStatus::Requested)
            }
        }

        deserializer.deserialize_any(StatusVisitor)
    }
}

/// A request to restock a medication.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationOrder {
    pub id: Uuid,
    pub medication_id: Uuid,
    pub requested_quantity: u32,
    pub status: OrderStatus,

    pub requested_at: DateTime<Utc>,
    pub requested_by: String,

    #[serde(default)]
    pub ordered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ordered_by: Option<String>,

    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub received_by: Option<String>,

    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_by: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl Record for MedicationOrder {
    const ENTITY_TYPE: &'static str = "MedicationOrder";
    const FILE_NAME: &'static str = "MedicationOrders.json";
    const SEED_FILE: Option<&'static str> = None;
    // Orders are local-only; the path is never called.
    const API_PATH: &'static str = "api/medicationOrders";

    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn validate(&self) -> SyncResult<()> {
        if self.medication_id.is_nil() {
            return Err(SyncError::validation("An order must reference a medication"));
        }
        if self.requested_quantity == 0 {
            return Err(SyncError::validation(
                "Requested quantity must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_labels() {
        assert_eq!(parse_legacy_status("Pending to Order"), OrderStatus::Requested);
        assert_eq!(parse_legacy_status("pending to stock in"), OrderStatus::Ordered);
        assert_eq!(parse_legacy_status("Completed"), OrderStatus::Received);
        assert_eq!(parse_legacy_status("Canceled"), OrderStatus::Cancelled);
        assert_eq!(parse_legacy_status("CANCELLED"), OrderStatus::Cancelled);
        assert_eq!(parse_legacy_status(" ordered "), OrderStatus::Ordered);
        assert_eq!(parse_legacy_status("2"), OrderStatus::Received);
        assert_eq!(parse_legacy_status("on the truck"), OrderStatus::Requested);
        assert_eq!(parse_legacy_status("42"), OrderStatus::Requested);
    }

    #[test]
    fn test_status_json_accepts_numbers_and_labels() {
        let statuses: Vec<OrderStatus> =
            serde_json::from_str(r#"[0, 1, 2, 3, 9, "Completed", "Ordered", null]"#).unwrap();
        assert_eq!(
            statuses,
            vec![
                OrderStatus::Requested,
                OrderStatus::Ordered,
                OrderStatus::Received,
                OrderStatus::Cancelled,
                OrderStatus::Requested,
                OrderStatus::Received,
                OrderStatus::Ordered,
                OrderStatus::Requested,
            ]
        );
    }

    #[test]
    fn test_strict_parse_rejects_unknown() {
        assert_eq!("received".parse::<OrderStatus>().unwrap(), OrderStatus::Received);
        assert_eq!("Pending to Order".parse::<OrderStatus>().unwrap(), OrderStatus::Requested);
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert!("2".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_written_as_name() {
        assert_eq!(serde_json::to_string(&OrderStatus::Cancelled).unwrap(), r#""Cancelled""#);
    }

    #[test]
    fn test_transition_table() {
        use OrderStatus::*;
        assert!(Requested.can_transition_to(Ordered));
        assert!(Requested.can_transition_to(Cancelled));
        assert!(Ordered.can_transition_to(Received));
        assert!(Ordered.can_transition_to(Cancelled));
        assert!(!Requested.can_transition_to(Received));
        assert!(!Cancelled.can_transition_to(Ordered));
        assert!(!Received.can_transition_to(Cancelled));
        for status in [Requested, Ordered, Received, Cancelled] {
            assert!(!status.can_transition_to(status));
        }
    }
}
