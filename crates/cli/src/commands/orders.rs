//! `ct-cli orders` - list and follow orders.

use std::sync::Arc;

use countertop_client::{ClientConfig, Connectivity, HttpClient, OrderSync, OrderTransport, OrderView};
use countertop_core::{Collection, Order};
use tracing::{error, info, warn};

use super::money;

/// Fetch and print the complete order list.
///
/// # Errors
///
/// Returns an error if the client cannot be built or the fetch fails.
pub async fn list(config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpClient::new(config)?;
    let orders = client.fetch_orders().await?;
    info!(count = orders.len(), "Fetched orders");
    print_orders(&orders);
    Ok(())
}

/// Run the order sync and print each published view until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub async fn watch(
    config: &ClientConfig,
    collections: Vec<Collection>,
) -> Result<(), Box<dyn std::error::Error>> {
    let collections = if collections.is_empty() {
        vec![Collection::Orders, Collection::SurplusOrders]
    } else {
        collections
    };

    let client = Arc::new(HttpClient::new(config)?);
    let sync = OrderSync::spawn(Arc::clone(&client), client, collections, config.sync());
    let mut view = sync.watch();

    loop {
        let changed = tokio::select! {
            changed = view.changed() => changed.is_ok(),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Failed to listen for Ctrl-C");
                }
                false
            }
        };
        if !changed {
            break;
        }

        let snapshot = view.borrow_and_update().clone();
        report(&snapshot);
    }

    sync.shutdown().await;
    Ok(())
}

fn report(view: &OrderView) {
    match &view.connectivity {
        Connectivity::Degraded { collection, reason } => {
            warn!(collection = %collection, reason = %reason, "Showing last known orders");
        }
        Connectivity::ReloadFailed { reason } => {
            warn!(reason = %reason, "Reload failed; showing last known orders");
        }
        connectivity => {
            info!(
                orders = view.orders.len(),
                active = view.active().count(),
                reloads = view.reloads,
                connectivity = ?connectivity,
                "Order view updated"
            );
        }
    }
    print_orders(&view.orders);
}

#[allow(clippy::print_stdout)]
fn print_orders(orders: &[Order]) {
    println!("{:<8} {:<8} {:<26} {:>10}  CUSTOMER", "ID", "PICKUP", "STATUS", "TOTAL");
    for order in orders {
        println!(
            "{:<8} {:<8} {:<26} {:>10}  {}",
            order.id.to_string(),
            order.pickup_number.as_deref().unwrap_or("-"),
            order.status_label,
            money(order.total),
            order.customer_name.as_deref().unwrap_or("")
        );
    }
    println!("{} order(s)", orders.len());
}
