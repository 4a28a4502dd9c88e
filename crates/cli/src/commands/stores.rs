//! Installed store management.

use stock_sync_app::db::{StoreDirectory, StoreRepository};
use stock_sync_core::ShopDomain;

use super::{CliError, connect};

/// Print every installed store.
pub async fn list() -> Result<(), CliError> {
    let repo = StoreRepository::new(connect().await?);
    let stores = repo.list().await?;

    if stores.is_empty() {
        tracing::info!("No stores installed");
        return Ok(());
    }

    #[allow(clippy::print_stdout)]
    for store in &stores {
        println!(
            "{}\t{}\t{}\t{}",
            store.shop_domain,
            store.shop_id,
            store.namespace(),
            store.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }

    Ok(())
}

/// Remove a store and its credential.
pub async fn remove(shop: &str) -> Result<(), CliError> {
    let shop = ShopDomain::parse(shop)?;
    let repo = StoreRepository::new(connect().await?);

    if repo.delete_by_domain(&shop).await? {
        tracing::info!("Removed store {}", shop);
        Ok(())
    } else {
        Err(CliError::UnknownStore(shop.into_inner()))
    }
}
