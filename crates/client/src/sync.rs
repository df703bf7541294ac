//! Background order synchronisation.
//!
//! One driver task owns the [`OrderBook`] and is its only writer. Per
//! collection, a pump task holds the change-feed subscription and forwards
//! batches to the driver; when a subscription breaks the pump reports it,
//! waits, and subscribes again. The driver applies feed actions, debounces
//! reloads through a [`ReloadGate`] and publishes every new state on a
//! `watch` channel.
//!
//! ```text
//! pump(orders) ──┐
//!                ├─ inbound ─▶ driver ── watch ─▶ OrderView
//! pump(surplus) ─┘               ▲
//!             handle ─ commands ─┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use countertop_core::{ChangeEvent, Collection, Order, OrderId, OrderPatch, OrderRef, OrderStatus};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::config::SyncConfig;
use crate::error::{FeedError, SyncError};
use crate::feed::{FeedAction, FeedTracker};
use crate::order_book::{Mutation, OrderBook};
use crate::reload::ReloadGate;
use crate::transport::{ChangeFeed, OrderTransport};

const COMMAND_QUEUE_LEN: usize = 64;
const INBOUND_QUEUE_LEN: usize = 256;

/// Health of the change feeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Connectivity {
    /// Waiting for every collection's initial snapshot.
    #[default]
    Connecting,
    /// Every collection is streaming.
    Live,
    /// A collection's feed is down; the list may be stale.
    Degraded {
        collection: Collection,
        reason: String,
    },
    /// The last full reload failed; another is scheduled.
    ReloadFailed { reason: String },
}

/// Published state of the order list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderView {
    pub orders: Vec<Order>,
    pub connectivity: Connectivity,
    /// Completed full reloads, including the initial fetch.
    pub reloads: u64,
}

impl OrderView {
    /// Returns true if any feed is down or the last reload failed.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(
            self.connectivity,
            Connectivity::Degraded { .. } | Connectivity::ReloadFailed { .. }
        )
    }

    /// Orders that are neither completed nor cancelled.
    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(|o| !o.status.is_terminal())
    }
}

#[derive(Debug)]
enum Command {
    Apply(Mutation),
    Reload,
}

#[derive(Debug)]
enum Inbound {
    Subscribed(Collection),
    Batch {
        collection: Collection,
        events: Vec<ChangeEvent>,
    },
    Down {
        collection: Collection,
        error: FeedError,
    },
}

/// Entry point for the background sync.
#[derive(Debug, Clone, Copy)]
pub struct OrderSync;

impl OrderSync {
    /// Start syncing `collections`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<T, F>(
        transport: Arc<T>,
        feed: Arc<F>,
        collections: impl IntoIterator<Item = Collection>,
        config: SyncConfig,
    ) -> OrderSyncHandle<T>
    where
        T: OrderTransport + 'static,
        F: ChangeFeed + 'static,
    {
        let mut unique: Vec<Collection> = Vec::new();
        for collection in collections {
            if !unique.contains(&collection) {
                unique.push(collection);
            }
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_LEN);
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_QUEUE_LEN);
        let (view_tx, view_rx) = watch::channel(OrderView::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        info!(collections = ?unique, "Starting order sync");

        let pumps = unique
            .iter()
            .map(|&collection| {
                tokio::spawn(
                    pump(
                        Arc::clone(&feed),
                        collection,
                        inbound_tx.clone(),
                        shutdown_rx.clone(),
                        config.resubscribe_delay,
                    )
                    .instrument(info_span!("feed_pump", collection = %collection)),
                )
            })
            .collect();
        drop(inbound_tx);

        let driver = Driver {
            transport: Arc::clone(&transport),
            book: OrderBook::new(),
            gate: ReloadGate::new(config.reload_quiet),
            trackers: unique.iter().map(|&c| (c, FeedTracker::new(c))).collect(),
            collections: unique,
            degraded: HashMap::new(),
            reload_error: None,
            retry_delay: config.resubscribe_delay,
            reloads: 0,
            view: view_tx,
        };
        let driver = tokio::spawn(
            driver
                .run(command_rx, inbound_rx)
                .instrument(info_span!("order_sync")),
        );

        OrderSyncHandle {
            transport,
            commands: command_tx,
            view: view_rx,
            shutdown: shutdown_tx,
            pumps,
            driver,
        }
    }
}

/// Control handle for a running sync.
///
/// Dropping the handle without [`OrderSyncHandle::shutdown`] still stops the
/// tasks, but does not wait for them.
#[derive(Debug)]
pub struct OrderSyncHandle<T> {
    transport: Arc<T>,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<OrderView>,
    shutdown: watch::Sender<bool>,
    pumps: Vec<JoinHandle<()>>,
    driver: JoinHandle<()>,
}

impl<T: OrderTransport + 'static> OrderSyncHandle<T> {
    /// Latest published view.
    #[must_use]
    pub fn view(&self) -> OrderView {
        self.view.borrow().clone()
    }

    /// Receiver that is notified on every published view.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<OrderView> {
        self.view.clone()
    }

    /// Schedule a debounced full reload.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the sync has stopped.
    pub async fn request_reload(&self) -> Result<(), SyncError> {
        self.commands
            .send(Command::Reload)
            .await
            .map_err(|_| SyncError::Closed)
    }

    /// Set the status of an order in `collection`.
    ///
    /// The local list is patched immediately; the remote update follows. If
    /// the remote update fails, a reload is scheduled so the authoritative
    /// status replaces the optimistic one.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the sync has stopped, or
    /// `SyncError::Transport` if the remote update failed.
    #[instrument(skip_all, fields(collection = %collection, order_id = %order_id, status = %status))]
    pub async fn update_status(
        &self,
        collection: Collection,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), SyncError> {
        let reference = OrderRef::by_id(order_id).in_collection(collection);
        let patch = OrderPatch::status(reference, status);
        self.commands
            .send(Command::Apply(Mutation::Optimistic(patch)))
            .await
            .map_err(|_| SyncError::Closed)?;

        if let Err(e) = self.transport.update_status(collection, order_id, status).await {
            warn!(error = %e, "Status update failed; reloading authoritative state");
            if self.commands.send(Command::Reload).await.is_err() {
                debug!("Order sync stopped before the reload could be scheduled");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Unsubscribe every feed and wait for all tasks to finish.
    pub async fn shutdown(self) {
        info!("Shutting down order sync");
        self.shutdown.send_replace(true);

        for pump in self.pumps {
            if let Err(e) = pump.await {
                error!(error = %e, "Feed pump task failed");
            }
        }

        drop(self.commands);
        if let Err(e) = self.driver.await {
            error!(error = %e, "Order sync task failed");
        }
        info!("Order sync stopped");
    }
}

struct Driver<T> {
    transport: Arc<T>,
    book: OrderBook,
    gate: ReloadGate,
    collections: Vec<Collection>,
    trackers: HashMap<Collection, FeedTracker>,
    /// Last failure per collection, cleared on resubscription.
    degraded: HashMap<Collection, String>,
    /// Last reload failure, cleared by the next successful reload.
    reload_error: Option<String>,
    retry_delay: Duration,
    reloads: u64,
    view: watch::Sender<OrderView>,
}

impl<T: OrderTransport> Driver<T> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut inbound: mpsc::Receiver<Inbound>,
    ) {
        self.reload().await;
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Apply(mutation)) => {
                        self.book.apply(mutation);
                        self.publish();
                    }
                    Some(Command::Reload) => {
                        debug!(already_pending = self.gate.is_armed(), "Reload requested");
                        self.gate.signal();
                    }
                    None => break,
                },
                Some(message) = inbound.recv() => {
                    self.handle(message);
                    self.publish();
                }
                () = self.gate.fired() => {
                    self.reload().await;
                    self.publish();
                }
            }
        }

        debug!("Order sync driver finished");
    }

    fn handle(&mut self, message: Inbound) {
        match message {
            Inbound::Subscribed(collection) => {
                self.degraded.remove(&collection);
                if let Some(tracker) = self.trackers.get_mut(&collection) {
                    tracker.on_subscribed();
                }
            }
            Inbound::Batch { collection, events } => {
                let actions = self
                    .trackers
                    .get_mut(&collection)
                    .map(|tracker| tracker.on_batch(events))
                    .unwrap_or_default();

                for action in actions {
                    match action {
                        FeedAction::Reload => self.gate.signal(),
                        FeedAction::Patch(patch) => {
                            self.book.apply(Mutation::Pushed(patch));
                        }
                        FeedAction::Remove(reference) => {
                            self.book.apply(Mutation::Removed(reference));
                        }
                    }
                }
            }
            Inbound::Down { collection, error } => {
                self.degraded.insert(collection, error.to_string());
            }
        }
    }

    async fn reload(&mut self) {
        match self.transport.fetch_orders().await {
            Ok(orders) => {
                self.book.apply(Mutation::Reloaded(orders));
                self.reloads += 1;
                self.reload_error = None;
                info!(count = self.book.len(), reloads = self.reloads, "Reloaded orders");
            }
            Err(e) => {
                self.gate.signal_after(self.retry_delay);
                error!(
                    error = %e,
                    retry_in_ms = self.retry_delay.as_millis(),
                    "Order reload failed; keeping last known list"
                );
                self.reload_error = Some(e.to_string());
            }
        }
    }

    fn connectivity(&self) -> Connectivity {
        let down = self
            .collections
            .iter()
            .find_map(|c| self.degraded.get(c).map(|reason| (*c, reason)));

        if let Some((collection, reason)) = down {
            return Connectivity::Degraded {
                collection,
                reason: reason.clone(),
            };
        }
        if let Some(reason) = &self.reload_error {
            return Connectivity::ReloadFailed {
                reason: reason.clone(),
            };
        }
        if self.trackers.values().all(FeedTracker::is_live) {
            Connectivity::Live
        } else {
            Connectivity::Connecting
        }
    }

    fn publish(&self) {
        self.view.send_replace(OrderView {
            orders: self.book.orders().to_vec(),
            connectivity: self.connectivity(),
            reloads: self.reloads,
        });
    }
}

/// Subscription loop for one collection.
async fn pump<F: ChangeFeed>(
    feed: Arc<F>,
    collection: Collection,
    inbound: mpsc::Sender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
    resubscribe_delay: Duration,
) {
    loop {
        if *shutdown.borrow() {
            return;
        }

        let subscribed = tokio::select! {
            result = feed.subscribe(collection) => Some(result),
            _ = shutdown.changed() => None,
        };
        let Some(subscribed) = subscribed else {
            return;
        };

        let failure = match subscribed {
            Ok(mut subscription) => {
                if inbound.send(Inbound::Subscribed(collection)).await.is_err() {
                    subscription.unsubscribe();
                    return;
                }

                let failure = loop {
                    let next = tokio::select! {
                        batch = subscription.next_batch() => Some(batch),
                        _ = shutdown.changed() => None,
                    };
                    let Some(next) = next else {
                        break None;
                    };

                    match next {
                        Some(Ok(events)) => {
                            let batch = Inbound::Batch { collection, events };
                            if inbound.send(batch).await.is_err() {
                                break None;
                            }
                        }
                        Some(Err(e)) => break Some(e),
                        None => {
                            break Some(FeedError::Stream {
                                collection,
                                reason: "channel closed".to_string(),
                            });
                        }
                    }
                };

                subscription.unsubscribe();
                match failure {
                    Some(e) => e,
                    None => return,
                }
            }
            Err(e) => e,
        };

        warn!(
            error = %failure,
            retry_in_ms = resubscribe_delay.as_millis(),
            "Change feed down"
        );
        let down = Inbound::Down {
            collection,
            error: failure,
        };
        if inbound.send(down).await.is_err() {
            return;
        }

        tokio::select! {
            () = tokio::time::sleep(resubscribe_delay) => {}
            _ = shutdown.changed() => return,
        }
    }
}
