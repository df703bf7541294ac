//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.
//!
//! Entities that can exist on the client before the remote store has seen
//! them (shift drafts, for example) are identified by [`EntityId`], which is
//! either a persisted id or a client-generated [`TempId`].

use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use countertop_core::define_id;
/// define_id!(TicketId);
/// define_id!(TableId);
///
/// let ticket_id = TicketId::new(1);
/// let table_id = TableId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: TicketId = table_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

// Define standard entity IDs
define_id!(OrderId);
define_id!(ShiftId);

/// A client-generated placeholder identity.
///
/// Only valid until the first successful persistence round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TempId(i64);

impl TempId {
    /// Create a temporary ID from a raw value.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the underlying i64 value.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl core::fmt::Display for TempId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "tmp-{}", self.0)
    }
}

/// Identity of a remote entity as known to the client.
///
/// The derived ordering places every persisted id before every temporary id,
/// then orders numerically. Deduplication keeps the smallest id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityId {
    /// Assigned by the remote store.
    Persisted(i64),
    /// Generated locally, never sent back as an identity.
    Temporary(TempId),
}

impl EntityId {
    /// Returns true if the remote store assigned this id.
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    /// Returns true if this is a client-generated placeholder.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }

    /// Returns the persisted id, if any.
    #[must_use]
    pub const fn persisted(&self) -> Option<i64> {
        match self {
            Self::Persisted(id) => Some(*id),
            Self::Temporary(_) => None,
        }
    }
}

impl core::fmt::Display for EntityId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Persisted(id) => write!(f, "{id}"),
            Self::Temporary(id) => write!(f, "{id}"),
        }
    }
}

impl From<OrderId> for EntityId {
    fn from(id: OrderId) -> Self {
        Self::Persisted(id.as_i64())
    }
}

impl From<ShiftId> for EntityId {
    fn from(id: ShiftId) -> Self {
        Self::Persisted(id.as_i64())
    }
}

impl From<TempId> for EntityId {
    fn from(id: TempId) -> Self {
        Self::Temporary(id)
    }
}

/// Something the remote store owns and the client mirrors.
pub trait RemoteEntity {
    /// Current identity of this entity.
    fn entity_id(&self) -> EntityId;
}

/// Issues strictly increasing temporary ids.
///
/// Seeded from the wall clock in milliseconds so ids from separate runs are
/// unlikely to repeat, then incremented atomically.
#[derive(Debug)]
pub struct TempIdGenerator {
    last: AtomicI64,
}

impl TempIdGenerator {
    /// Create a generator seeded from the current time.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp_millis())
    }

    /// Create a generator whose first id is `seed + 1`.
    #[must_use]
    pub const fn starting_at(seed: i64) -> Self {
        Self {
            last: AtomicI64::new(seed),
        }
    }

    /// Issue the next temporary id.
    pub fn next_id(&self) -> TempId {
        let now = chrono::Utc::now().timestamp_millis();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return TempId(candidate),
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for TempIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
