//! Error taxonomy for the engine.
//!
//! Validation and empty-cart errors are recovered locally. Transport failures
//! during submission are retryable by the caller. Change-feed failures never
//! stop the sync task; they surface as a connectivity indicator instead.

use countertop_core::Collection;
use thiserror::Error;

/// Errors from a remote collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Endpoint URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by the server.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Collaborator could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

/// A required specification was not satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required group has no selection.
    #[error("Please choose an option for \"{group}\"")]
    MissingSelection {
        /// Name of the unsatisfied group.
        group: String,
    },

    /// A single-select group has more than one selection.
    #[error("Only one option can be chosen for \"{group}\"")]
    TooManySelections {
        /// Name of the offending group.
        group: String,
    },
}

impl ValidationError {
    /// Name of the group the message refers to.
    #[must_use]
    pub fn group(&self) -> &str {
        match self {
            Self::MissingSelection { group } | Self::TooManySelections { group } => group,
        }
    }
}

/// Errors from the order submission pipeline.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Nothing to submit. Raised before any network call.
    #[error("Cart is empty")]
    EmptyCart,

    /// Network or server failure. The cart is left untouched.
    #[error("Order submission failed: {0}")]
    SubmissionFailed(#[source] TransportError),
}

impl OrderError {
    /// Whether re-invoking submission may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::SubmissionFailed(_))
    }
}

/// Change-feed channel failures.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The subscription could not be established.
    #[error("Failed to subscribe to {collection}: {source}")]
    Subscribe {
        /// Collection being subscribed.
        collection: Collection,
        /// Underlying transport failure.
        #[source]
        source: TransportError,
    },

    /// An established subscription broke.
    #[error("Change feed for {collection} interrupted: {reason}")]
    Stream {
        /// Collection whose feed broke.
        collection: Collection,
        /// Human-readable cause.
        reason: String,
    },
}

impl FeedError {
    /// Collection the failure belongs to.
    #[must_use]
    pub const fn collection(&self) -> Collection {
        match self {
            Self::Subscribe { collection, .. } | Self::Stream { collection, .. } => *collection,
        }
    }
}

/// Errors from the shift planner's save-then-refetch round trip.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Saving the local plan failed; nothing changed locally.
    #[error("Failed to save shift plan: {0}")]
    Save(#[source] TransportError),

    /// The plan was saved but could not be re-fetched.
    #[error("Shift plan saved but refetch failed: {0}")]
    Refetch(#[source] TransportError),
}

/// Errors from the order sync handle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The sync task has stopped.
    #[error("Order sync has stopped")]
    Closed,

    /// The remote update failed; a reload has been scheduled.
    #[error("Order update failed: {0}")]
    Transport(#[from] TransportError),
}
