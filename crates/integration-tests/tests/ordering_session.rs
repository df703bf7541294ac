//! Integration tests for the ordering flow: add, choose options, check out.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use countertop_client::{
    AddOutcome, OrderError, OrderSubmitter, OrderingSession, SpecificationResolver,
    SpecificationSelection, SubmissionContext, SubmissionResult, ValidationError,
};
use countertop_core::{
    CatalogItem, CatalogItemId, Channel, OrderId, PaymentMethod, SelectionMode,
    SpecificationGroup, SpecificationOption,
};
use countertop_integration_tests::{FakeCatalog, FakeOrders};
use rust_decimal::Decimal;

type Session = OrderingSession<FakeCatalog, FakeOrders>;

fn item(id: &str, price: i64) -> CatalogItem {
    CatalogItem::new(CatalogItemId::parse(id).unwrap(), id, Decimal::from(price))
}

fn option(id: &str, name: &str, adjustment: i64) -> SpecificationOption {
    SpecificationOption {
        id: id.to_string(),
        name: name.to_string(),
        price_adjustment: Decimal::from(adjustment),
    }
}

fn size_group() -> SpecificationGroup {
    SpecificationGroup {
        id: "size".to_string(),
        name: "Size".to_string(),
        mode: SelectionMode::Single,
        required: true,
        options: vec![option("small", "Small", 0), option("large", "Large", 20)],
    }
}

fn toppings_group() -> SpecificationGroup {
    SpecificationGroup {
        id: "toppings".to_string(),
        name: "Toppings".to_string(),
        mode: SelectionMode::Multiple,
        required: false,
        options: vec![option("shot", "Extra shot", 15), option("oat", "Oat milk", 10)],
    }
}

fn session() -> (Session, Arc<FakeCatalog>, Arc<FakeOrders>) {
    let catalog = Arc::new(
        FakeCatalog::default().with_groups("latte", vec![size_group(), toppings_group()]),
    );
    let orders = Arc::new(FakeOrders::default());
    let session = OrderingSession::new(
        SpecificationResolver::new(Arc::clone(&catalog), Duration::from_secs(300)),
        OrderSubmitter::new(Arc::clone(&orders)),
    );
    (session, catalog, orders)
}

// =============================================================================
// Adding items
// =============================================================================

#[tokio::test]
async fn test_item_without_options_is_added_directly() {
    let (mut session, _catalog, _orders) = session();
    let cookie = item("cookie", 40);

    let first = session.begin_add(&cookie).await;
    let second = session.begin_add(&cookie).await;

    assert_eq!(first, second);
    let AddOutcome::Added(key) = first else {
        panic!("expected a direct add");
    };
    assert_eq!(session.cart().line(&key).unwrap().quantity, 2);
    assert_eq!(session.cart().total(), Decimal::from(80));
}

#[tokio::test]
async fn test_required_group_blocks_add_until_chosen() {
    let (mut session, _catalog, _orders) = session();
    let latte = item("latte", 100);

    let AddOutcome::NeedsSelection(groups) = session.begin_add(&latte).await else {
        panic!("latte has options");
    };
    let mut selection = SpecificationSelection::new(groups);

    let err = session.add_with_selection(&latte, &selection).unwrap_err();
    assert_eq!(
        err,
        ValidationError::MissingSelection {
            group: "Size".to_string()
        }
    );
    assert!(session.cart().is_empty());

    assert!(selection.toggle("size", "large"));
    assert_eq!(selection.adjustment(), Decimal::from(20));

    let key = session.add_with_selection(&latte, &selection).unwrap();
    let line = session.cart().line(&key).unwrap();
    assert_eq!(line.unit_price, Decimal::from(120));
    assert_eq!(line.selected_specifications.len(), 1);
    assert_eq!(line.selected_specifications[0].option_name, "Large");
}

#[tokio::test]
async fn test_single_select_switch_and_multi_select_toggle() {
    let (mut session, _catalog, _orders) = session();
    let latte = item("latte", 100);
    let AddOutcome::NeedsSelection(groups) = session.begin_add(&latte).await else {
        panic!("latte has options");
    };
    let mut selection = SpecificationSelection::new(groups);

    selection.toggle("size", "large");
    selection.toggle("size", "small");
    selection.toggle("toppings", "shot");
    selection.toggle("toppings", "oat");
    selection.toggle("toppings", "oat");

    assert!(!selection.is_selected("size", "large"));
    assert_eq!(selection.adjustment(), Decimal::from(15));

    let key = session.add_with_selection(&latte, &selection).unwrap();
    assert_eq!(session.cart().line(&key).unwrap().unit_price, Decimal::from(115));
}

#[tokio::test]
async fn test_same_selection_merges_and_different_selection_splits() {
    let (mut session, _catalog, _orders) = session();
    let latte = item("latte", 100);
    let AddOutcome::NeedsSelection(groups) = session.begin_add(&latte).await else {
        panic!("latte has options");
    };

    let mut large = SpecificationSelection::new(groups.clone());
    large.toggle("size", "large");
    let mut small = SpecificationSelection::new(groups);
    small.toggle("size", "small");

    let first = session.add_with_selection(&latte, &large).unwrap();
    let again = session.add_with_selection(&latte, &large).unwrap();
    let other = session.add_with_selection(&latte, &small).unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(session.cart().lines().len(), 2);
    assert_eq!(session.cart().total(), Decimal::from(340));
}

#[tokio::test]
async fn test_specification_load_failure_downgrades_to_direct_add() {
    let (mut session, catalog, _orders) = session();
    catalog.fail(true);
    let latte = item("latte", 100);

    let AddOutcome::Added(key) = session.begin_add(&latte).await else {
        panic!("failed load must not ask for a selection");
    };
    let line = session.cart().line(&key).unwrap();
    assert!(line.selected_specifications.is_empty());
    assert_eq!(line.unit_price, Decimal::from(100));

    // Failures are not cached.
    catalog.fail(false);
    assert!(matches!(
        session.begin_add(&latte).await,
        AddOutcome::NeedsSelection(_)
    ));
    assert_eq!(catalog.calls(), 2);
}

#[tokio::test]
async fn test_embedded_groups_skip_the_catalog() {
    let (mut session, catalog, _orders) = session();
    let mocha = item("mocha", 110).with_specification_groups(vec![size_group()]);

    let AddOutcome::NeedsSelection(groups) = session.begin_add(&mocha).await else {
        panic!("embedded groups have options");
    };
    assert_eq!(groups, vec![size_group()]);
    assert_eq!(catalog.calls(), 0);

    // An empty snapshot means nothing to choose, even if the catalog knows better.
    let plain = item("latte", 100).with_specification_groups(Vec::new());
    assert!(matches!(session.begin_add(&plain).await, AddOutcome::Added(_)));
    assert_eq!(catalog.calls(), 0);
}

#[tokio::test]
async fn test_groups_are_cached_between_adds() {
    let (mut session, catalog, _orders) = session();
    let latte = item("latte", 100);

    session.begin_add(&latte).await;
    session.begin_add(&latte).await;

    assert_eq!(catalog.calls(), 1);
}

#[tokio::test]
async fn test_decrement_to_zero_removes_line() {
    let (mut session, _catalog, _orders) = session();
    let AddOutcome::Added(key) = session.begin_add(&item("cookie", 40)).await else {
        panic!("expected a direct add");
    };

    assert_eq!(session.decrement(&key), Some(0));
    assert!(session.cart().is_empty());
    assert_eq!(session.decrement(&key), None);
}

#[tokio::test]
async fn test_redemption_line_lowers_total() {
    let (mut session, _catalog, _orders) = session();
    let coffee = item("coffee", 100);
    session.begin_add(&coffee).await;
    session.begin_add(&coffee).await;
    let reward = CatalogItem::redemption(
        CatalogItemId::parse("reward").unwrap(),
        "Loyalty reward",
        Decimal::from(-20),
    );
    session.begin_add(&reward).await;

    assert_eq!(session.cart().total(), Decimal::from(180));
    assert_eq!(session.cart().item_count(), 3);
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_returns_pickup_number_and_clears_cart() {
    let (mut session, _catalog, orders) = session();
    session.begin_add(&item("platter", 300)).await;
    session.cart_mut().set_note("  ring the bell  ");
    let ctx = SubmissionContext::new(Channel::DineIn, PaymentMethod::Cash).with_slot("12:30");

    let result = session.checkout(&ctx).await.unwrap();

    assert_eq!(
        result,
        SubmissionResult {
            persisted_order_id: OrderId::new(42),
            assigned_sequence_number: "A7".to_string(),
        }
    );
    assert!(session.cart().is_empty());

    let requests = orders.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.lines.len(), 1);
    assert_eq!(request.lines[0].quantity, 1);
    assert_eq!(request.note.as_deref(), Some("ring the bell"));
    assert_eq!(request.channel, Channel::DineIn);
    assert_eq!(request.fulfillment_slot.as_deref(), Some("12:30"));
    assert_eq!(request.idempotency_key, ctx.idempotency_key);
}

#[tokio::test]
async fn test_failed_checkout_keeps_cart_and_retries_with_same_key() {
    let (mut session, _catalog, orders) = session();
    session.begin_add(&item("platter", 300)).await;
    let ctx = SubmissionContext::default();
    orders.fail_submit(true);

    let err = session.checkout(&ctx).await.unwrap_err();
    assert!(matches!(err, OrderError::SubmissionFailed(_)));
    assert!(err.is_retryable());
    assert_eq!(session.cart().total(), Decimal::from(300));

    orders.fail_submit(false);
    session.checkout(&ctx).await.unwrap();

    let requests = orders.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].idempotency_key, requests[1].idempotency_key);
    assert!(session.cart().is_empty());
}

#[tokio::test]
async fn test_empty_cart_is_rejected_before_network() {
    let (mut session, _catalog, orders) = session();

    let err = session.checkout(&SubmissionContext::default()).await.unwrap_err();

    assert!(matches!(err, OrderError::EmptyCart));
    assert!(!err.is_retryable());
    assert!(orders.requests().is_empty());
}
