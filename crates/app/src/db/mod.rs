//! Store directory persistence.
//!
//! # Database
//!
//! ## Tables (schema `stock_sync`)
//!
//! - `stores` - One row per installed shop: id, domain, access token, scopes
//! - `session` - tower-sessions storage (OAuth CSRF state)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/app/migrations/` and run via:
//! ```bash
//! cargo run -p stock-sync-cli -- migrate
//! ```

mod memory;
mod stores;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use stock_sync_core::{Namespace, ShopDomain, ShopId};
use thiserror::Error;

pub use memory::MemoryStoreDirectory;
pub use stores::StoreRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., a domain already claimed by another shop).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// An installed store.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct StoreRecord {
    /// Platform-assigned shop id (primary key).
    pub shop_id: ShopId,
    /// Current `*.myshopify.com` domain.
    pub shop_domain: ShopDomain,
    /// Offline Admin API access token.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// When the store first installed the app.
    pub created_at: DateTime<Utc>,
    /// When the credential was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl StoreRecord {
    /// The metafield namespace holding this store's linkages.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        Namespace::for_shop(self.shop_id)
    }
}

impl std::fmt::Debug for StoreRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRecord")
            .field("shop_id", &self.shop_id)
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Data written when a store completes OAuth.
#[derive(Clone)]
pub struct NewStore {
    /// Platform-assigned shop id.
    pub shop_id: ShopId,
    /// Shop domain the install came from.
    pub shop_domain: ShopDomain,
    /// Freshly exchanged access token.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for NewStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewStore")
            .field("shop_id", &self.shop_id)
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Lookup and lifecycle of installed stores.
#[async_trait]
pub trait StoreDirectory: Send + Sync {
    /// Find a store by domain.
    async fn find_by_domain(&self, shop: &ShopDomain)
    -> Result<Option<StoreRecord>, RepositoryError>;

    /// Insert a store, or replace the credential of an existing one.
    ///
    /// Keyed by shop id, so a shop whose domain changed keeps its row.
    async fn upsert(&self, store: &NewStore) -> Result<StoreRecord, RepositoryError>;

    /// Remove a store. Returns whether a row existed.
    async fn delete_by_domain(&self, shop: &ShopDomain) -> Result<bool, RepositoryError>;

    /// All stores, ordered by domain.
    async fn list(&self) -> Result<Vec<StoreRecord>, RepositoryError>;

    /// Check the backing store is reachable.
    async fn health_check(&self) -> Result<(), RepositoryError>;
}

/// Scopes as stored in the `scopes` column.
pub(crate) fn join_scopes(scopes: &[String]) -> String {
    scopes.join(",")
}

/// Parse the `scopes` column.
pub(crate) fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
