//! Change-feed consumption.
//!
//! A [`FeedTracker`] turns the raw batches of one collection's subscription
//! into [`FeedAction`]s. The first batch after subscribing is the snapshot of
//! what the remote store already holds; it becomes the baseline and produces
//! no actions, so opening a view never triggers a reload storm. If the
//! subscription is re-opened after a failure, the new snapshot may hide
//! changes missed while disconnected, so it asks for one reload instead.

use countertop_core::{ChangeEvent, Collection, Operation, OrderPatch, OrderRef};
use tracing::debug;

/// What the order book should do in response to a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedAction {
    /// Schedule a debounced full reload.
    Reload,
    /// Patch the matching order in place. The patch is scoped to the
    /// collection the event arrived on.
    Patch(OrderPatch),
    /// Remove the matching order. The reference is scoped like a patch.
    Remove(OrderRef),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingSnapshot { resumed: bool },
    Live,
}

/// Per-collection subscription state.
#[derive(Debug, Clone)]
pub struct FeedTracker {
    collection: Collection,
    phase: Phase,
    snapshots_seen: u64,
}

impl FeedTracker {
    /// Tracker for a collection that has not been subscribed yet.
    #[must_use]
    pub const fn new(collection: Collection) -> Self {
        Self {
            collection,
            phase: Phase::AwaitingSnapshot { resumed: false },
            snapshots_seen: 0,
        }
    }

    /// Collection this tracker follows.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Returns true once the initial snapshot has been consumed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    /// A (new) subscription was opened; the next batch is its snapshot.
    pub fn on_subscribed(&mut self) {
        self.phase = Phase::AwaitingSnapshot {
            resumed: self.snapshots_seen > 0,
        };
    }

    /// Translate one batch into actions.
    pub fn on_batch(&mut self, events: Vec<ChangeEvent>) -> Vec<FeedAction> {
        if let Phase::AwaitingSnapshot { resumed } = self.phase {
            self.phase = Phase::Live;
            self.snapshots_seen += 1;
            debug!(
                collection = %self.collection,
                events = events.len(),
                resumed,
                "Change feed snapshot received"
            );
            return if resumed { vec![FeedAction::Reload] } else { Vec::new() };
        }

        let mut actions = Vec::with_capacity(events.len());
        let mut reload = false;

        for event in events {
            if event.collection != self.collection {
                debug!(
                    collection = %self.collection,
                    event_collection = %event.collection,
                    "Ignoring event for another collection"
                );
                continue;
            }

            match event.operation {
                Operation::Added => reload = true,
                Operation::Modified | Operation::Removed if event.payload.reference().is_empty() => {
                    debug!(
                        collection = %self.collection,
                        operation = ?event.operation,
                        "Ignoring event without an order reference"
                    );
                }
                Operation::Modified => {
                    let mut patch = event.payload;
                    patch.collection = Some(self.collection);
                    actions.push(FeedAction::Patch(patch));
                }
                Operation::Removed => {
                    let reference = event.payload.reference().in_collection(self.collection);
                    actions.push(FeedAction::Remove(reference));
                }
            }
        }

        if reload {
            actions.push(FeedAction::Reload);
        }
        actions
    }
}
