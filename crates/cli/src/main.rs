//! Stock Sync CLI - Database migrations and store management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! stock-sync migrate
//!
//! # List installed stores
//! stock-sync stores list
//!
//! # Forget a store (as the uninstall webhook would)
//! stock-sync stores remove a.myshopify.com
//!
//! # Create any missing linkage metafield definitions for a store
//! stock-sync schema ensure a.myshopify.com
//! ```
//!
//! # Environment Variables
//!
//! - `APP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `SHOPIFY_API_VERSION` - Admin API version for `schema ensure`
//! - `SCHEMA_RETRY_ATTEMPTS`, `SCHEMA_RETRY_DELAY_MS` - Rate-limit retries for `schema ensure`

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "stock-sync")]
#[command(author, version, about = "Stock Sync CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage installed stores
    Stores {
        #[command(subcommand)]
        action: StoresAction,
    },
    /// Manage linkage metafield definitions
    Schema {
        #[command(subcommand)]
        action: SchemaAction,
    },
}

#[derive(Subcommand)]
enum StoresAction {
    /// List installed stores
    List,
    /// Remove a store and its credential
    Remove {
        /// Shop domain (e.g. `a.myshopify.com`)
        shop: String,
    },
}

#[derive(Subcommand)]
enum SchemaAction {
    /// Create any missing linkage metafield definitions
    Ensure {
        /// Shop domain (e.g. `a.myshopify.com`)
        shop: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Stores { action } => match action {
            StoresAction::List => commands::stores::list().await?,
            StoresAction::Remove { shop } => commands::stores::remove(&shop).await?,
        },
        Commands::Schema { action } => match action {
            SchemaAction::Ensure { shop } => commands::schema::ensure(&shop).await?,
        },
    }
    Ok(())
}
