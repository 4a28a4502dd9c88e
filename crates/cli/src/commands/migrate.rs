//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! stock-sync migrate
//! ```
//!
//! Migrations live in `crates/app/migrations/` and create the `stock_sync`
//! schema (`stores` and `session` tables).

use super::{CliError, connect};

/// Run the app database migrations.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../app/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
