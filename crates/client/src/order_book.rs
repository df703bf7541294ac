//! The local order list.
//!
//! Every change to the list is a [`Mutation`] applied through
//! [`OrderBook::apply`], whether it came from the user, the change feed or a
//! full reload.

use countertop_core::{Collection, Order, OrderId, OrderPatch, OrderRef};
use tracing::debug;

use crate::reconcile::{self, Retain};

/// A change to the local order list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Local edit applied before the remote store confirms it.
    Optimistic(OrderPatch),
    /// `modified` event pushed by the change feed.
    Pushed(OrderPatch),
    /// `removed` event pushed by the change feed.
    Removed(OrderRef),
    /// Complete authoritative list from a reload.
    Reloaded(Vec<Order>),
}

/// What a mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Patched(OrderId),
    Removed(OrderId),
    /// Number of orders after the reload.
    Reloaded(usize),
    /// No local order matched; nothing changed.
    Unmatched,
}

/// Orders currently shown, in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    /// Create an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Orders in display order.
    #[must_use]
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Number of orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Returns true if there are no orders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Index of the order `reference` identifies.
    ///
    /// Only orders in the reference's collection are considered when it names
    /// one. A persisted id match anywhere in the list wins over a natural-key
    /// match; among natural-key matches the first one wins.
    #[must_use]
    pub fn position(&self, reference: &OrderRef) -> Option<usize> {
        self.orders
            .iter()
            .position(|o| o.matches_id(reference))
            .or_else(|| {
                self.orders
                    .iter()
                    .position(|o| o.matches_natural_key(reference))
            })
    }

    /// Apply `mutation` to the list.
    pub fn apply(&mut self, mutation: Mutation) -> Applied {
        match mutation {
            Mutation::Optimistic(patch) | Mutation::Pushed(patch) => self.apply_patch(&patch),
            Mutation::Removed(reference) => self.apply_removal(&reference),
            Mutation::Reloaded(server) => {
                let mut merged =
                    reconcile::merge(&self.orders, &server, identity, Retain::ServerOnly);
                for order in &mut merged {
                    if order.status_label.is_empty() {
                        order.status_label = order.status.label().to_string();
                    }
                }
                self.orders = merged;
                Applied::Reloaded(self.orders.len())
            }
        }
    }

    fn apply_patch(&mut self, patch: &OrderPatch) -> Applied {
        let reference = patch.reference();
        let Some(index) = self.position(&reference) else {
            debug!(order = %reference, "No local order matches patch");
            return Applied::Unmatched;
        };
        let Some(updated) = self.orders.get(index).map(|o| patched(o, patch)) else {
            return Applied::Unmatched;
        };

        let id = updated.id;
        debug!(order_id = %id, status = %updated.status, "Patched order");
        reconcile::patch(&mut self.orders, index, updated);
        Applied::Patched(id)
    }

    fn apply_removal(&mut self, reference: &OrderRef) -> Applied {
        let removed = self
            .position(reference)
            .and_then(|index| reconcile::remove(&mut self.orders, index));

        match removed {
            Some(order) => {
                debug!(order_id = %order.id, "Removed order");
                Applied::Removed(order.id)
            }
            None => {
                debug!(order = %reference, "No local order matches removal");
                Applied::Unmatched
            }
        }
    }
}

/// Ids are only unique within a collection.
fn identity(order: &Order) -> (Collection, OrderId) {
    (order.collection, order.id)
}

/// `order` with `patch` applied.
///
/// A new status re-derives the label unless the patch carries a non-empty one.
#[must_use]
pub fn patched(order: &Order, patch: &OrderPatch) -> Order {
    let mut updated = order.clone();
    let label = patch
        .status_label
        .as_deref()
        .filter(|label| !label.is_empty());

    if let Some(status) = patch.status {
        updated.status = status;
        updated.status_label = label.unwrap_or_else(|| status.label()).to_string();
    } else if let Some(label) = label {
        updated.status_label = label.to_string();
    }
    updated
}
