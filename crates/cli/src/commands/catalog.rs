//! `ct-cli catalog` - catalog lookups.

use countertop_client::{CatalogSource, ClientConfig, HttpClient};
use countertop_core::{CatalogItemId, SelectionMode};
use tracing::info;

use super::{CommandError, money};

/// Print the specification groups of `item_id`.
///
/// Unlike the ordering flow, a load failure is reported instead of being
/// treated as "no options".
///
/// # Errors
///
/// Returns an error if the id is blank or the lookup fails.
pub async fn specs(config: &ClientConfig, item_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let item_id = CatalogItemId::parse(item_id).map_err(CommandError::from)?;
    let client = HttpClient::new(config)?;
    let groups = client.specification_groups(&item_id).await?;
    info!(item_id = %item_id, groups = groups.len(), "Fetched specification groups");

    #[allow(clippy::print_stdout)]
    {
        if groups.is_empty() {
            println!("{item_id} has no specifications");
        }
        for group in &groups {
            let mode = match group.mode {
                SelectionMode::Single => "choose one",
                SelectionMode::Multiple => "choose any",
            };
            let required = if group.required { ", required" } else { "" };
            println!("{} ({mode}{required})", group.name);
            for option in &group.options {
                println!("  - {:<20} {:>8}", option.name, money(option.price_adjustment));
            }
        }
    }
    Ok(())
}
