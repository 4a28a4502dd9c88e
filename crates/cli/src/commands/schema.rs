//! Metafield definition management.

use stock_sync_app::config::{DEFAULT_API_VERSION, RetryConfig};
use stock_sync_app::db::{StoreDirectory, StoreRepository};
use stock_sync_app::services::{StoreSession, SyncEngine};
use stock_sync_app::shopify::{PlatformConnector, RetryPolicy, ShopifyConnector};
use stock_sync_core::ShopDomain;

use super::{CliError, connect};

/// Create any missing linkage metafield definitions for `shop`.
pub async fn ensure(shop: &str) -> Result<(), CliError> {
    let shop = ShopDomain::parse(shop)?;
    let repo = StoreRepository::new(connect().await?);
    let retry = RetryPolicy::from(RetryConfig::from_env()?);

    let record = repo
        .find_by_domain(&shop)
        .await?
        .ok_or_else(|| CliError::UnknownStore(shop.to_string()))?;

    let api_version =
        std::env::var("SHOPIFY_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());
    let connector = ShopifyConnector::new(reqwest::Client::builder().build()?, api_version);
    let platform = connector.connect(&record.shop_domain, &record.access_token);
    let session = StoreSession::new(&record, platform);

    tracing::info!("Ensuring metafield definitions in {}", session.namespace());
    let report = SyncEngine::for_session(&session)
        .with_retry(retry)
        .ensure_schema()
        .await?;

    for field in &report.created {
        tracing::info!("Created definition {}", field.key());
    }
    for field in &report.existing {
        tracing::info!("Definition {} already exists", field.key());
    }

    Ok(())
}
