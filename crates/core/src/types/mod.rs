//! Core types for Countertop.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod catalog;
pub mod id;
pub mod order;
pub mod price;
pub mod shift;
pub mod status;

pub use catalog::{
    CatalogItem, CatalogItemId, CatalogItemIdError, SelectedSpecification, SpecificationGroup,
    SpecificationOption,
};
pub use id::*;
pub use order::{ChangeEvent, Order, OrderItemSummary, OrderPatch, OrderRef};
pub use price::{CurrencyCode, Price};
pub use shift::{Shift, ShiftDraft, ShiftKey};
pub use status::*;
