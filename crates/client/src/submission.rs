//! Order submission pipeline.
//!
//! Turns a cart into an [`OrderRequest`], hands it to the transport, and
//! clears the cart only once the order is persisted. There is no automatic
//! retry; a failed submission leaves the cart intact for the caller to retry
//! with the same [`SubmissionContext`].

use std::sync::Arc;

use countertop_core::{CatalogItemId, Channel, OrderId, PaymentMethod, SelectedSpecification};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::cart::CartAggregate;
use crate::error::OrderError;
use crate::transport::OrderTransport;

/// How and when the order is fulfilled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionContext {
    pub channel: Channel,
    /// Requested pickup or delivery slot.
    pub fulfillment_slot: Option<String>,
    pub payment_method: PaymentMethod,
    /// Deduplicates retries of the same submission server-side.
    pub idempotency_key: Uuid,
}

impl SubmissionContext {
    /// Context with a fresh idempotency key.
    #[must_use]
    pub fn new(channel: Channel, payment_method: PaymentMethod) -> Self {
        Self {
            channel,
            fulfillment_slot: None,
            payment_method,
            idempotency_key: Uuid::new_v4(),
        }
    }

    /// Set the requested fulfillment slot.
    #[must_use]
    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.fulfillment_slot = Some(slot.into());
        self
    }
}

impl Default for SubmissionContext {
    fn default() -> Self {
        Self::new(Channel::default(), PaymentMethod::default())
    }
}

/// One line of the submitted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub item_id: CatalogItemId,
    pub quantity: u32,
    pub selections: Vec<SelectedSpecification>,
}

/// Payload sent to the order transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub lines: Vec<OrderLineRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fulfillment_slot: Option<String>,
    pub payment_method: PaymentMethod,
    /// Sent as a header, not in the body.
    #[serde(skip)]
    pub idempotency_key: Uuid,
}

impl OrderRequest {
    /// Build the payload for `cart` under `ctx`.
    #[must_use]
    pub fn from_cart(cart: &CartAggregate, ctx: &SubmissionContext) -> Self {
        let lines = cart
            .lines()
            .iter()
            .map(|line| OrderLineRequest {
                item_id: line.catalog_item_id.clone(),
                quantity: line.quantity,
                selections: line.selected_specifications.clone(),
            })
            .collect();

        let note = Some(cart.note().trim())
            .filter(|n| !n.is_empty())
            .map(str::to_owned);

        Self {
            lines,
            note,
            channel: ctx.channel,
            fulfillment_slot: ctx.fulfillment_slot.clone(),
            payment_method: ctx.payment_method,
            idempotency_key: ctx.idempotency_key,
        }
    }
}

/// Transport acknowledgement of a persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub id: OrderId,
    pub pickup_number: String,
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub persisted_order_id: OrderId,
    /// Pickup number shown to the customer.
    pub assigned_sequence_number: String,
}

impl From<OrderReceipt> for SubmissionResult {
    fn from(receipt: OrderReceipt) -> Self {
        Self {
            persisted_order_id: receipt.id,
            assigned_sequence_number: receipt.pickup_number,
        }
    }
}

/// Submits carts through an [`OrderTransport`].
#[derive(Debug)]
pub struct OrderSubmitter<T> {
    transport: Arc<T>,
}

impl<T> Clone for OrderSubmitter<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: OrderTransport> OrderSubmitter<T> {
    /// Create a submitter over `transport`.
    #[must_use]
    pub const fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Submit `cart` and clear it on success.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` without touching the network if the
    /// cart has no lines, or `OrderError::SubmissionFailed` if the transport
    /// fails. The cart is unchanged in both cases.
    #[instrument(
        skip(self, cart, ctx),
        fields(lines = cart.lines().len(), idempotency_key = %ctx.idempotency_key)
    )]
    pub async fn submit(
        &self,
        cart: &mut CartAggregate,
        ctx: &SubmissionContext,
    ) -> Result<SubmissionResult, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        let request = OrderRequest::from_cart(cart, ctx);
        let receipt = self
            .transport
            .submit_order(&request)
            .await
            .map_err(|e| {
                warn!(error = %e, "Order submission failed; cart kept for retry");
                OrderError::SubmissionFailed(e)
            })?;

        cart.clear();
        info!(
            order_id = %receipt.id,
            pickup_number = %receipt.pickup_number,
            "Order submitted"
        );
        Ok(receipt.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use countertop_core::CatalogItem;
    use rust_decimal::Decimal;

    use super::*;

    fn cart_with_latte() -> CartAggregate {
        let mut cart = CartAggregate::new();
        let latte = CatalogItem::new(CatalogItemId::parse("latte").unwrap(), "Latte", Decimal::from(100));
        cart.add(
            &latte,
            vec![SelectedSpecification {
                group_name: "Size".to_string(),
                option_name: "Large".to_string(),
                price_adjustment: Decimal::from(20),
            }],
        );
        cart.add(&latte, vec![]);
        cart
    }

    #[test]
    fn test_request_maps_lines() {
        let mut cart = cart_with_latte();
        cart.set_note("  extra hot ");
        let ctx = SubmissionContext::new(Channel::DineIn, PaymentMethod::Cash).with_slot("12:30");

        let request = OrderRequest::from_cart(&cart, &ctx);

        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[0].selections.len(), 1);
        assert!(request.lines[1].selections.is_empty());
        assert_eq!(request.note.as_deref(), Some("extra hot"));
        assert_eq!(request.fulfillment_slot.as_deref(), Some("12:30"));
        assert_eq!(request.idempotency_key, ctx.idempotency_key);
    }

    #[test]
    fn test_request_json_omits_blank_note_and_key() {
        let cart = cart_with_latte();
        let request = OrderRequest::from_cart(&cart, &SubmissionContext::default());
        let json = serde_json::to_value(&request).unwrap();

        assert!(json.get("note").is_none());
        assert!(json.get("idempotency_key").is_none());
        assert_eq!(json["channel"], "takeaway");
        assert_eq!(json["lines"][0]["item_id"], "latte");
    }

    #[test]
    fn test_contexts_get_distinct_keys() {
        let a = SubmissionContext::default();
        let b = SubmissionContext::default();
        assert_ne!(a.idempotency_key, b.idempotency_key);
    }

    #[test]
    fn test_receipt_into_result() {
        let result: SubmissionResult = OrderReceipt {
            id: OrderId::new(42),
            pickup_number: "A7".to_string(),
        }
        .into();
        assert_eq!(result.persisted_order_id, OrderId::new(42));
        assert_eq!(result.assigned_sequence_number, "A7");
    }
}
