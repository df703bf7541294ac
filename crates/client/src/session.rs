//! One customer's ordering session: a cart plus the services it needs.

use countertop_core::{CatalogItem, SpecificationGroup};
use tracing::debug;

use crate::cart::CartAggregate;
use crate::error::{OrderError, ValidationError};
use crate::specification::{SpecificationResolver, SpecificationSelection, has_selectable_specifications};
use crate::submission::{OrderSubmitter, SubmissionContext, SubmissionResult};
use crate::transport::{CatalogSource, OrderTransport};
use crate::variant_key::VariantKey;

/// Result of tapping "add" on a catalog item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item had nothing to choose and is in the cart.
    Added(VariantKey),
    /// The customer has to pick options first.
    NeedsSelection(Vec<SpecificationGroup>),
}

/// Cart, specification lookups and checkout for one session.
#[derive(Debug)]
pub struct OrderingSession<C, T> {
    cart: CartAggregate,
    resolver: SpecificationResolver<C>,
    submitter: OrderSubmitter<T>,
}

impl<C: CatalogSource, T: OrderTransport> OrderingSession<C, T> {
    /// Start a session with an empty cart.
    #[must_use]
    pub fn new(resolver: SpecificationResolver<C>, submitter: OrderSubmitter<T>) -> Self {
        Self {
            cart: CartAggregate::new(),
            resolver,
            submitter,
        }
    }

    /// The session's cart.
    #[must_use]
    pub const fn cart(&self) -> &CartAggregate {
        &self.cart
    }

    /// Mutable access for note editing.
    pub const fn cart_mut(&mut self) -> &mut CartAggregate {
        &mut self.cart
    }

    /// Add `item`, or ask for a selection if it has options.
    ///
    /// Items whose specifications cannot be loaded are added directly.
    pub async fn begin_add(&mut self, item: &CatalogItem) -> AddOutcome {
        let groups = self.resolver.groups_for(item).await;
        if has_selectable_specifications(&groups) {
            debug!(item_id = %item.id, groups = groups.len(), "Item needs a selection");
            return AddOutcome::NeedsSelection(groups);
        }
        AddOutcome::Added(self.cart.add(item, Vec::new()))
    }

    /// Add `item` with the options chosen in `selection`.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` of the selection; the cart is
    /// unchanged.
    pub fn add_with_selection(
        &mut self,
        item: &CatalogItem,
        selection: &SpecificationSelection,
    ) -> Result<VariantKey, ValidationError> {
        selection.validate()?;
        Ok(self.cart.add(item, selection.selected()))
    }

    /// Remove one unit of a line. Returns the remaining quantity.
    pub fn decrement(&mut self, key: &VariantKey) -> Option<u32> {
        self.cart.decrement(key)
    }

    /// Empty the cart.
    pub fn clear(&mut self) {
        self.cart.clear();
    }

    /// Submit the cart.
    ///
    /// # Errors
    ///
    /// See [`OrderSubmitter::submit`].
    pub async fn checkout(&mut self, ctx: &SubmissionContext) -> Result<SubmissionResult, OrderError> {
        self.submitter.submit(&mut self.cart, ctx).await
    }
}
