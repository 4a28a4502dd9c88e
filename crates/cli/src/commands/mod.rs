//! CLI command implementations.

pub mod migrate;
pub mod schema;
pub mod stores;

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use stock_sync_app::config::ConfigError;
use stock_sync_app::db::RepositoryError;
use stock_sync_app::services::SyncError;
use stock_sync_core::ShopDomainError;
use thiserror::Error;

/// Errors that can occur running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// An environment variable has an invalid value.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Store directory operation failed.
    #[error("Store directory error: {0}")]
    Repository(#[from] RepositoryError),

    /// The shop argument is not a valid shop domain.
    #[error("Invalid shop domain: {0}")]
    InvalidShop(#[from] ShopDomainError),

    /// The shop has not installed the app.
    #[error("No installed store for {0}")]
    UnknownStore(String),

    /// The sync engine failed.
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Database URL from `APP_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();

    std::env::var("APP_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("APP_DATABASE_URL"))
}

/// Connect to the app database.
async fn connect() -> Result<PgPool, CliError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(PgPool::connect(database_url.expose_secret()).await?)
}
