//! Remote collaborators consumed by the engine.
//!
//! The engine only depends on the traits below. [`HttpClient`] implements all
//! of them against the Countertop REST API; tests substitute in-memory fakes.

mod http;
mod sse;

pub use http::HttpClient;

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use countertop_core::{
    CatalogItemId, ChangeEvent, Collection, Order, OrderId, OrderStatus, Shift,
    SpecificationGroup,
};
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::error::{FeedError, TransportError};
use crate::submission::{OrderReceipt, OrderRequest};

/// Read-only catalog lookups.
pub trait CatalogSource: Send + Sync {
    /// Specification groups for an item, possibly empty.
    fn specification_groups(
        &self,
        item_id: &CatalogItemId,
    ) -> impl Future<Output = Result<Vec<SpecificationGroup>, TransportError>> + Send;
}

/// Request/response order operations.
pub trait OrderTransport: Send + Sync {
    /// Submit a new order.
    fn submit_order(
        &self,
        request: &OrderRequest,
    ) -> impl Future<Output = Result<OrderReceipt, TransportError>> + Send;

    /// Fetch the complete authoritative order list.
    fn fetch_orders(&self) -> impl Future<Output = Result<Vec<Order>, TransportError>> + Send;

    /// Change the status of a persisted order in `collection`.
    fn update_status(
        &self,
        collection: Collection,
        order_id: OrderId,
        status: OrderStatus,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Push channel of order changes.
pub trait ChangeFeed: Send + Sync {
    /// Open a subscription. The first batch it yields is the initial snapshot.
    fn subscribe(
        &self,
        collection: Collection,
    ) -> impl Future<Output = Result<Subscription, FeedError>> + Send;
}

/// Bulk persistence for shift plans.
pub trait ShiftStore: Send + Sync {
    /// Persist the local plan. The result is not trusted to be reconciled.
    fn save(&self, shifts: &[Shift]) -> impl Future<Output = Result<Vec<Shift>, TransportError>> + Send;

    /// Fetch persisted shifts in `[from, to]`.
    fn fetch(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Shift>, TransportError>> + Send;
}

type EventBatches = Pin<Box<dyn Stream<Item = Result<Vec<ChangeEvent>, FeedError>> + Send>>;
type Teardown = Box<dyn FnOnce() + Send>;

/// A live change-feed subscription.
///
/// Yields batches of events until the channel closes. Must be torn down with
/// [`Subscription::unsubscribe`]; dropping it without doing so still tears it
/// down but logs a warning, since it usually means a view forgot to clean up.
pub struct Subscription {
    collection: Collection,
    batches: EventBatches,
    teardown: Option<Teardown>,
}

impl Subscription {
    /// Wrap a batch stream and the action that closes it upstream.
    pub fn new<S, F>(collection: Collection, batches: S, teardown: F) -> Self
    where
        S: Stream<Item = Result<Vec<ChangeEvent>, FeedError>> + Send + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            collection,
            batches: Box::pin(batches),
            teardown: Some(Box::new(teardown)),
        }
    }

    /// Collection this subscription follows.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Next batch, or `None` once the channel has closed.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<ChangeEvent>, FeedError>> {
        self.batches.next().await
    }

    /// Close the subscription.
    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
            debug!(collection = %self.collection, "Unsubscribed from change feed");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            warn!(
                collection = %self.collection,
                "Change feed subscription dropped without unsubscribe"
            );
            teardown();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("collection", &self.collection)
            .field("active", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use countertop_core::{Operation, OrderPatch};

    use super::*;

    fn counting_subscription(closed: &Arc<AtomicUsize>) -> Subscription {
        let event = ChangeEvent::new(Collection::Orders, Operation::Added, OrderPatch::default());
        let counter = Arc::clone(closed);
        Subscription::new(
            Collection::Orders,
            futures::stream::iter(vec![Ok(vec![event])]),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test]
    async fn test_yields_batches_then_ends() {
        let closed = Arc::new(AtomicUsize::new(0));
        let mut subscription = counting_subscription(&closed);

        let batch = subscription.next_batch().await.unwrap().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(subscription.next_batch().await.is_none());
        subscription.unsubscribe();
    }

    #[test]
    fn test_unsubscribe_runs_teardown_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        counting_subscription(&closed).unsubscribe();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_without_unsubscribe_still_tears_down() {
        let closed = Arc::new(AtomicUsize::new(0));
        drop(counting_subscription(&closed));
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
