//! Countertop Client - cart identity and order reconciliation engine.
//!
//! # Architecture
//!
//! - Cart lines are keyed by [`VariantKey`] so product variants never collide
//! - Local order lists are kept consistent with the remote store by a single
//!   writer task ([`sync`]) fed by the change feed, optimistic edits and
//!   debounced full reloads
//! - Every list mutation goes through the pure functions in [`reconcile`]
//! - Remote collaborators are traits in [`transport`]; [`HttpClient`]
//!   implements all of them with `reqwest`
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use countertop_client::{ClientConfig, HttpClient, OrderSync};
//! use countertop_core::Collection;
//!
//! let config = ClientConfig::from_env()?;
//! let client = Arc::new(HttpClient::new(&config)?);
//!
//! let sync = OrderSync::spawn(
//!     Arc::clone(&client),
//!     client,
//!     [Collection::Orders, Collection::SurplusOrders],
//!     config.sync(),
//! );
//! let mut view = sync.watch();
//! while view.changed().await.is_ok() {
//!     let orders = view.borrow().orders.len();
//!     tracing::info!(orders, "Order list updated");
//! }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod config;
pub mod error;
pub mod feed;
pub mod order_book;
pub mod reconcile;
pub mod reload;
pub mod schedule;
pub mod session;
pub mod specification;
pub mod submission;
pub mod sync;
pub mod transport;
pub mod variant_key;

pub use cart::{CartAggregate, CartLine};
pub use config::{ClientConfig, ConfigError, SyncConfig};
pub use error::{FeedError, OrderError, PlanError, SyncError, TransportError, ValidationError};
pub use feed::{FeedAction, FeedTracker};
pub use order_book::{Applied, Mutation, OrderBook};
pub use reconcile::Retain;
pub use reload::ReloadGate;
pub use schedule::ShiftPlanner;
pub use session::{AddOutcome, OrderingSession};
pub use specification::{SpecificationResolver, SpecificationSelection};
pub use submission::{
    OrderLineRequest, OrderReceipt, OrderRequest, OrderSubmitter, SubmissionContext,
    SubmissionResult,
};
pub use sync::{Connectivity, OrderSync, OrderSyncHandle, OrderView};
pub use transport::{
    CatalogSource, ChangeFeed, HttpClient, OrderTransport, ShiftStore, Subscription,
};
pub use variant_key::VariantKey;
