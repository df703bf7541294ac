//! Orders and the change-feed records that describe mutations to them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{EntityId, OrderId, RemoteEntity};
use super::status::{Collection, Operation, OrderStatus};

/// A line on a persisted order, as rendered in order lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemSummary {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub options: Vec<String>,
}

/// An order as held in the local list.
///
/// Unknown fields from the remote store are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub collection: Collection,
    pub order_number: Option<String>,
    pub pickup_number: Option<String>,
    pub status: OrderStatus,
    /// Display label for the status. Re-derived whenever the status changes.
    #[serde(default)]
    pub status_label: String,
    pub total: Decimal,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItemSummary>,
    pub created_at: DateTime<Utc>,
}

impl RemoteEntity for Order {
    fn entity_id(&self) -> EntityId {
        self.id.into()
    }
}

impl Order {
    /// Returns true if `reference` identifies this order.
    ///
    /// Persisted id wins when the reference carries one. Otherwise either
    /// natural key matches when both sides carry it. A reference scoped to a
    /// collection never matches an order of another collection.
    #[must_use]
    pub fn matches(&self, reference: &OrderRef) -> bool {
        self.matches_id(reference) || self.matches_natural_key(reference)
    }

    /// Returns true if the reference is unscoped or scoped to this order's
    /// collection.
    #[must_use]
    pub fn in_scope_of(&self, reference: &OrderRef) -> bool {
        reference.collection.is_none_or(|c| c == self.collection)
    }

    /// Persisted id comparison only.
    #[must_use]
    pub fn matches_id(&self, reference: &OrderRef) -> bool {
        self.in_scope_of(reference) && reference.document_id == Some(self.id)
    }

    /// Natural key comparison only (`order_number` or `pickup_number`).
    #[must_use]
    pub fn matches_natural_key(&self, reference: &OrderRef) -> bool {
        if !self.in_scope_of(reference) {
            return false;
        }
        let same = |ours: &Option<String>, theirs: &Option<String>| {
            matches!((ours, theirs), (Some(a), Some(b)) if a == b)
        };
        same(&self.order_number, &reference.order_number)
            || same(&self.pickup_number, &reference.pickup_number)
    }
}

/// Correlation handle for a local order.
///
/// Ids and pickup numbers are only unique within a collection; `None` means
/// the reference matches in any collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef {
    #[serde(default)]
    pub collection: Option<Collection>,
    pub document_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub pickup_number: Option<String>,
}

impl OrderRef {
    /// Reference an order by persisted id.
    #[must_use]
    pub const fn by_id(id: OrderId) -> Self {
        Self {
            collection: None,
            document_id: Some(id),
            order_number: None,
            pickup_number: None,
        }
    }

    /// Restrict the reference to `collection`.
    #[must_use]
    pub fn in_collection(mut self, collection: Collection) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Reference an order by pickup number.
    #[must_use]
    pub fn by_pickup_number(pickup_number: impl Into<String>) -> Self {
        Self {
            pickup_number: Some(pickup_number.into()),
            ..Self::default()
        }
    }

    /// Returns true if the reference carries no usable handle.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.order_number.is_none() && self.pickup_number.is_none()
    }
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(id) = self.document_id {
            return write!(f, "order {id}");
        }
        if let Some(number) = &self.order_number {
            return write!(f, "order #{number}");
        }
        if let Some(number) = &self.pickup_number {
            return write!(f, "pickup {number}");
        }
        f.write_str("unidentified order")
    }
}

/// Raw change payload. Carries only the fields the remote store pushes.
///
/// `collection` is not part of the wire payload; the feed consumer stamps it
/// from the enclosing [`ChangeEvent`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPatch {
    #[serde(skip)]
    pub collection: Option<Collection>,
    #[serde(default)]
    pub document_id: Option<OrderId>,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub pickup_number: Option<String>,
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub status_label: Option<String>,
}

impl OrderPatch {
    /// Patch that sets the status of the referenced order.
    #[must_use]
    pub fn status(reference: OrderRef, status: OrderStatus) -> Self {
        Self {
            collection: reference.collection,
            document_id: reference.document_id,
            order_number: reference.order_number,
            pickup_number: reference.pickup_number,
            status: Some(status),
            status_label: None,
        }
    }

    /// The correlation handle carried by this patch.
    #[must_use]
    pub fn reference(&self) -> OrderRef {
        OrderRef {
            collection: self.collection,
            document_id: self.document_id,
            order_number: self.order_number.clone(),
            pickup_number: self.pickup_number.clone(),
        }
    }
}

/// One notification from the change feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub operation: Operation,
    pub payload: OrderPatch,
}

impl ChangeEvent {
    /// Build an event; used by feed adapters and tests.
    #[must_use]
    pub const fn new(collection: Collection, operation: Operation, payload: OrderPatch) -> Self {
        Self {
            collection,
            operation,
            payload,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order {
            id: OrderId::new(7),
            collection: Collection::Orders,
            order_number: Some("1007".to_string()),
            pickup_number: Some("A7".to_string()),
            status: OrderStatus::Pending,
            status_label: OrderStatus::Pending.label().to_string(),
            total: Decimal::new(300, 0),
            customer_name: None,
            items: vec![],
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_matches_by_persisted_id() {
        assert!(order().matches(&OrderRef::by_id(OrderId::new(7))));
        assert!(!order().matches(&OrderRef::by_id(OrderId::new(8))));
    }

    #[test]
    fn test_matches_by_either_natural_key() {
        assert!(order().matches(&OrderRef::by_pickup_number("A7")));
        let by_number = OrderRef {
            order_number: Some("1007".to_string()),
            ..OrderRef::default()
        };
        assert!(order().matches(&by_number));
    }

    #[test]
    fn test_missing_field_on_one_side_never_matches() {
        let mut local = order();
        local.pickup_number = None;
        assert!(!local.matches(&OrderRef::by_pickup_number("A7")));
        assert!(!local.matches(&OrderRef::default()));
    }

    #[test]
    fn test_scoped_reference_ignores_other_collection() {
        let surplus = OrderRef::by_pickup_number("A7").in_collection(Collection::SurplusOrders);
        assert!(!order().matches(&surplus));
        assert!(!order().matches(&OrderRef::by_id(OrderId::new(7)).in_collection(Collection::SurplusOrders)));

        let standard = OrderRef::by_pickup_number("A7").in_collection(Collection::Orders);
        assert!(order().matches(&standard));
    }

    #[test]
    fn test_order_ignores_unknown_fields() {
        let json = r#"{
            "id": 42,
            "order_number": null,
            "pickup_number": "A7",
            "status": "ready",
            "total": "300",
            "customer_name": null,
            "created_at": "2026-01-01T10:00:00Z",
            "table_layout": {"x": 1}
        }"#;
        let parsed: Order = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id, OrderId::new(42));
        assert_eq!(parsed.collection, Collection::Orders);
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn test_change_event_wire_shape() {
        let event: ChangeEvent = serde_json::from_str(
            r#"{"collection":"surplus_orders","operation":"modified","payload":{"pickup_number":"B2","status":"ready"}}"#,
        )
        .unwrap();
        assert_eq!(event.collection, Collection::SurplusOrders);
        assert_eq!(event.operation, Operation::Modified);
        assert_eq!(event.payload.reference(), OrderRef::by_pickup_number("B2"));
    }
}
