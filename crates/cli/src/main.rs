//! Countertop CLI - order board, catalog and shift plan tools.
//!
//! # Usage
//!
//! ```bash
//! # Print the current order list
//! ct-cli orders list
//!
//! # Follow live order changes until Ctrl-C
//! ct-cli orders watch --collection orders --collection surplus_orders
//!
//! # Show the specification groups of a catalog item
//! ct-cli catalog specs latte
//!
//! # Save a shift plan and print the reconciled result
//! ct-cli shifts sync plan.yaml --from 2026-03-02 --to 2026-03-08
//! ```
//!
//! Configuration comes from the environment (see `countertop_client::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use countertop_client::ClientConfig;
use countertop_core::Collection;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ct-cli")]
#[command(author, version, about = "Countertop CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and follow orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Inspect the catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Manage shift plans
    Shifts {
        #[command(subcommand)]
        action: ShiftsAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Fetch and print the order list
    List,
    /// Follow live changes until interrupted
    Watch {
        /// Collections to follow (`orders`, `surplus_orders`); defaults to both
        #[arg(short, long = "collection")]
        collections: Vec<Collection>,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Print the specification groups of an item
    Specs {
        /// Catalog item id
        item_id: String,
    },
}

#[derive(Subcommand)]
enum ShiftsAction {
    /// Save a YAML shift plan and print the reconciled list
    Sync {
        /// Path to the YAML plan
        file: String,

        /// First day of the planned range (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,

        /// Last day of the planned range (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Sentry must be initialized before the tracing subscriber
    let config = ClientConfig::from_env();
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "countertop_client=info,countertop_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, &config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Orders { action } => match action {
            OrdersAction::List => commands::orders::list(config).await?,
            OrdersAction::Watch { collections } => {
                commands::orders::watch(config, collections).await?;
            }
        },
        Commands::Catalog { action } => match action {
            CatalogAction::Specs { item_id } => commands::catalog::specs(config, &item_id).await?,
        },
        Commands::Shifts { action } => match action {
            ShiftsAction::Sync { file, from, to } => {
                commands::shifts::sync(config, &file, from, to).await?;
            }
        },
    }
    Ok(())
}
