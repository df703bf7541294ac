//! Integration tests for Countertop.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p countertop-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `order_sync` - change feed, reload gate and order book wired together
//! - `ordering_session` - cart, specification selection and checkout
//! - `shift_planner` - bulk save with mandatory re-fetch
//!
//! The collaborators below are in-memory fakes that count calls and let a test
//! drive the change feed by hand. Timing-sensitive tests run on a paused Tokio
//! clock (`#[tokio::test(start_paused = true)]`).

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate};
use countertop_client::{
    CatalogSource, ChangeFeed, FeedError, OrderReceipt, OrderRequest, OrderTransport, ShiftStore,
    Subscription, TransportError,
};
use countertop_core::{
    CatalogItemId, ChangeEvent, Collection, EntityId, Operation, Order, OrderId, OrderPatch,
    OrderRef, OrderStatus, Shift, SpecificationGroup,
};
use futures::channel::mpsc::{UnboundedSender, unbounded};
use rust_decimal::Decimal;
use tokio::sync::Notify;

// =============================================================================
// Fixtures
// =============================================================================

/// A persisted order with a pickup number derived from its id.
#[must_use]
pub fn order(id: i64, status: OrderStatus) -> Order {
    Order {
        id: OrderId::new(id),
        collection: Collection::Orders,
        order_number: Some(format!("N{id}")),
        pickup_number: Some(format!("A{id}")),
        status,
        status_label: status.label().to_string(),
        total: Decimal::from(100),
        customer_name: None,
        items: vec![],
        created_at: DateTime::from_timestamp(1_770_000_000 + id, 0).unwrap(),
    }
}

/// Like [`order`], but in the surplus collection with an `S` pickup prefix.
#[must_use]
pub fn surplus_order(id: i64, status: OrderStatus) -> Order {
    Order {
        collection: Collection::SurplusOrders,
        pickup_number: Some(format!("S{id}")),
        ..order(id, status)
    }
}

/// A change event about `order`.
#[must_use]
pub fn event(collection: Collection, operation: Operation, order: &Order) -> ChangeEvent {
    ChangeEvent::new(
        collection,
        operation,
        OrderPatch {
            collection: None,
            document_id: Some(order.id),
            order_number: order.order_number.clone(),
            pickup_number: order.pickup_number.clone(),
            status: Some(order.status),
            status_label: None,
        },
    )
}

/// A `modified` event that only carries a pickup number and a new status.
#[must_use]
pub fn status_event(collection: Collection, pickup: &str, status: OrderStatus) -> ChangeEvent {
    ChangeEvent::new(
        collection,
        Operation::Modified,
        OrderPatch::status(OrderRef::by_pickup_number(pickup), status),
    )
}

// =============================================================================
// Order transport
// =============================================================================

/// In-memory order store.
#[derive(Default)]
pub struct FakeOrders {
    orders: Mutex<Vec<Order>>,
    requests: Mutex<Vec<OrderRequest>>,
    fetch_calls: AtomicUsize,
    fail_fetch: AtomicBool,
    fail_submit: AtomicBool,
    fail_update: AtomicBool,
}

impl FakeOrders {
    /// Store holding `orders`.
    #[must_use]
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: Mutex::new(orders),
            ..Self::default()
        }
    }

    /// Replace the authoritative list.
    pub fn set_orders(&self, orders: Vec<Order>) {
        *self.orders.lock().unwrap() = orders;
    }

    /// Number of full-list fetches so far.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Requests received by `submit_order`, including failed ones.
    pub fn requests(&self) -> Vec<OrderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.fail_update.store(fail, Ordering::SeqCst);
    }
}

impl OrderTransport for FakeOrders {
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderReceipt, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("request timed out".to_string()));
        }
        Ok(OrderReceipt {
            id: OrderId::new(42),
            pickup_number: "A7".to_string(),
        })
    }

    async fn fetch_orders(&self) -> Result<Vec<Order>, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("connection refused".to_string()));
        }
        Ok(self.orders.lock().unwrap().clone())
    }

    async fn update_status(
        &self,
        collection: Collection,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), TransportError> {
        if self.fail_update.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 409,
                body: "order is already completed".to_string(),
            });
        }
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.collection == collection && o.id == order_id)
            .ok_or_else(|| TransportError::NotFound(order_id.to_string()))?;
        order.status = status;
        order.status_label = status.label().to_string();
        Ok(())
    }
}

// =============================================================================
// Change feed
// =============================================================================

type BatchSender = UnboundedSender<Result<Vec<ChangeEvent>, FeedError>>;

#[derive(Default)]
struct FeedState {
    senders: Mutex<HashMap<Collection, BatchSender>>,
    subscribes: Mutex<HashMap<Collection, usize>>,
    active: AtomicUsize,
    fail_subscribe: AtomicBool,
    changed: Notify,
}

/// Change feed driven by the test.
#[derive(Clone, Default)]
pub struct FakeFeed {
    state: Arc<FeedState>,
}

impl FakeFeed {
    /// Deliver a batch on the open subscription of `collection`.
    pub fn push(&self, collection: Collection, events: Vec<ChangeEvent>) {
        let senders = self.state.senders.lock().unwrap();
        let sender = senders.get(&collection).unwrap();
        sender.unbounded_send(Ok(events)).unwrap();
    }

    /// Break the open subscription of `collection`.
    pub fn break_stream(&self, collection: Collection, reason: &str) {
        let sender = self.state.senders.lock().unwrap().remove(&collection).unwrap();
        sender
            .unbounded_send(Err(FeedError::Stream {
                collection,
                reason: reason.to_string(),
            }))
            .unwrap();
    }

    /// Make new subscriptions fail until reset.
    pub fn fail_subscribe(&self, fail: bool) {
        self.state.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    /// Successful subscriptions opened for `collection` so far.
    pub fn subscribes(&self, collection: Collection) -> usize {
        self.state
            .subscribes
            .lock()
            .unwrap()
            .get(&collection)
            .copied()
            .unwrap_or(0)
    }

    /// Subscriptions not yet torn down.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Wait until `collection` has been subscribed `count` times.
    pub async fn wait_for_subscribes(&self, collection: Collection, count: usize) {
        loop {
            let changed = self.state.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();
            if self.subscribes(collection) >= count {
                return;
            }
            changed.await;
        }
    }
}

impl ChangeFeed for FakeFeed {
    async fn subscribe(&self, collection: Collection) -> Result<Subscription, FeedError> {
        if self.state.fail_subscribe.load(Ordering::SeqCst) {
            return Err(FeedError::Subscribe {
                collection,
                source: TransportError::Unavailable("feed offline".to_string()),
            });
        }

        let (sender, receiver) = unbounded();
        self.state.senders.lock().unwrap().insert(collection, sender);
        *self
            .state
            .subscribes
            .lock()
            .unwrap()
            .entry(collection)
            .or_insert(0) += 1;
        self.state.active.fetch_add(1, Ordering::SeqCst);
        self.state.changed.notify_waiters();

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(collection, receiver, move || {
            state.active.fetch_sub(1, Ordering::SeqCst);
            state.changed.notify_waiters();
        }))
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog with fixed specification groups per item.
#[derive(Default)]
pub struct FakeCatalog {
    groups: HashMap<CatalogItemId, Vec<SpecificationGroup>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeCatalog {
    /// Register groups for an item.
    #[must_use]
    pub fn with_groups(mut self, item_id: &str, groups: Vec<SpecificationGroup>) -> Self {
        self.groups.insert(CatalogItemId::parse(item_id).unwrap(), groups);
        self
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CatalogSource for FakeCatalog {
    async fn specification_groups(
        &self,
        item_id: &CatalogItemId,
    ) -> Result<Vec<SpecificationGroup>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("catalog offline".to_string()));
        }
        Ok(self.groups.get(item_id).cloned().unwrap_or_default())
    }
}

// =============================================================================
// Shift store
// =============================================================================

/// Shift store that assigns ids on save.
///
/// Like the real store, its save response is not the reconciled list: it
/// echoes the request.
#[derive(Default)]
pub struct FakeShiftStore {
    rows: Mutex<Vec<Shift>>,
    next_id: AtomicUsize,
    fail_save: AtomicBool,
}

impl FakeShiftStore {
    /// Store already holding `rows`.
    #[must_use]
    pub fn with_rows(rows: Vec<Shift>) -> Self {
        let next = rows.iter().filter_map(|r| r.id.persisted()).max().unwrap_or(0);
        Self {
            rows: Mutex::new(rows),
            next_id: AtomicUsize::new(usize::try_from(next).unwrap()),
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<Shift> {
        self.rows.lock().unwrap().clone()
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }
}

impl ShiftStore for FakeShiftStore {
    async fn save(&self, shifts: &[Shift]) -> Result<Vec<Shift>, TransportError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }

        let mut rows = self.rows.lock().unwrap();
        for shift in shifts {
            if shift.id.is_temporary() {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                let mut row = shift.clone();
                row.id = EntityId::Persisted(i64::try_from(id).unwrap());
                rows.push(row);
            } else if let Some(row) = rows.iter_mut().find(|r| r.id == shift.id) {
                *row = shift.clone();
            }
        }
        Ok(shifts.to_vec())
    }

    async fn fetch(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<Shift>, TransportError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect())
    }
}
