//! Cart aggregate.
//!
//! Lines are kept in insertion order and keyed by [`VariantKey`]. A line's
//! unit price is frozen when the line is created; later catalog changes do
//! not reprice it. A line never exists at quantity zero.

use std::collections::HashSet;

use countertop_core::{CatalogItem, CatalogItemId, ItemType, SelectedSpecification};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::variant_key::VariantKey;

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_key: VariantKey,
    pub catalog_item_id: CatalogItemId,
    pub name: String,
    /// Base price plus selection adjustments at add time.
    pub unit_price: Decimal,
    /// Always at least 1.
    pub quantity: u32,
    pub selected_specifications: Vec<SelectedSpecification>,
    pub kind: ItemType,
}

impl CartLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// The cart of one ordering session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartAggregate {
    lines: Vec<CartLine>,
    note: String,
}

impl CartAggregate {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one unit of `item` with `selections`.
    ///
    /// Increments the existing line for the same variant, or appends a new
    /// line priced at `base_price + Σ adjustments`. A group/option pair
    /// chosen more than once counts once.
    pub fn add(
        &mut self,
        item: &CatalogItem,
        mut selections: Vec<SelectedSpecification>,
    ) -> VariantKey {
        let mut seen = HashSet::new();
        selections.retain(|s| seen.insert((s.group_name.clone(), s.option_name.clone())));
        let key = VariantKey::resolve(&item.id, &selections);

        if let Some(line) = self.lines.iter_mut().find(|l| l.variant_key == key) {
            line.quantity += 1;
            debug!(variant = %key, quantity = line.quantity, "Incremented cart line");
            return key;
        }

        let adjustment: Decimal = selections.iter().map(|s| s.price_adjustment).sum();
        let line = CartLine {
            variant_key: key.clone(),
            catalog_item_id: item.id.clone(),
            name: item.name.clone(),
            unit_price: item.base_price + adjustment,
            quantity: 1,
            selected_specifications: selections,
            kind: item.kind,
        };
        debug!(variant = %key, unit_price = %line.unit_price, "Added cart line");
        self.lines.push(line);
        key
    }

    /// Remove one unit of the line with `key`.
    ///
    /// Returns the remaining quantity (`Some(0)` when the line was removed),
    /// or `None` if no line has that key.
    pub fn decrement(&mut self, key: &VariantKey) -> Option<u32> {
        let index = self.lines.iter().position(|l| &l.variant_key == key)?;
        let remaining = {
            let line = self.lines.get_mut(index)?;
            line.quantity = line.quantity.saturating_sub(1);
            line.quantity
        };

        if remaining == 0 {
            self.lines.remove(index);
            debug!(variant = %key, "Removed cart line");
        } else {
            debug!(variant = %key, quantity = remaining, "Decremented cart line");
        }
        Some(remaining)
    }

    /// Remove every line and the note.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.note.clear();
    }

    /// Σ `unit_price * quantity`, including negative redemption lines.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Total floored at zero for the whole order.
    #[must_use]
    pub fn payable_total(&self) -> Decimal {
        self.total().max(Decimal::ZERO)
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Line with `key`, if present.
    #[must_use]
    pub fn line(&self, key: &VariantKey) -> Option<&CartLine> {
        self.lines.iter().find(|l| &l.variant_key == key)
    }

    /// Returns true if the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Σ quantity.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Free-text note for the kitchen.
    #[must_use]
    pub fn note(&self) -> &str {
        &self.note
    }

    /// Replace the free-text note.
    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = note.into();
    }
}
