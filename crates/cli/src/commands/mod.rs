//! Subcommand implementations.

pub mod catalog;
pub mod orders;
pub mod shifts;

use countertop_core::{CurrencyCode, Price};
use rust_decimal::Decimal;

/// Errors specific to CLI input.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("File not found: {0}")]
    FileNotFound(String),
    #[error("Invalid catalog item id: {0}")]
    InvalidItemId(#[from] countertop_core::CatalogItemIdError),
}

/// Format an amount in the store currency.
pub fn money(amount: Decimal) -> String {
    Price::new(amount, CurrencyCode::default()).display()
}
