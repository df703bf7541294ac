//! Countertop Core - Shared types library.
//!
//! This crate provides the types shared by every Countertop component:
//! - `client` - Cart, order reconciliation and sync engine
//! - `cli` - Command-line tools for watching orders and syncing shift plans
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no HTTP clients,
//! no async runtime. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, prices, statuses, catalog, order, shift and
//!   change-feed records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
