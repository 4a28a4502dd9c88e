//! In-memory store directory for tests and local tooling.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use stock_sync_core::ShopDomain;
use tokio::sync::RwLock;

use super::{NewStore, RepositoryError, StoreDirectory, StoreRecord};

/// Store directory kept in a map keyed by shop domain.
///
/// Mirrors the `PostgreSQL` rules: shop id is the identity, and a domain can
/// only belong to one shop.
#[derive(Debug, Default)]
pub struct MemoryStoreDirectory {
    stores: RwLock<HashMap<ShopDomain, StoreRecord>>,
}

impl MemoryStoreDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreDirectory for MemoryStoreDirectory {
    async fn find_by_domain(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<StoreRecord>, RepositoryError> {
        Ok(self.stores.read().await.get(shop).cloned())
    }

    async fn upsert(&self, store: &NewStore) -> Result<StoreRecord, RepositoryError> {
        let mut stores = self.stores.write().await;

        if let Some(other) = stores.get(&store.shop_domain)
            && other.shop_id != store.shop_id
        {
            return Err(RepositoryError::Conflict(format!(
                "shop domain {} belongs to another shop",
                store.shop_domain
            )));
        }

        let previous_domain = stores
            .values()
            .find(|record| record.shop_id == store.shop_id)
            .map(|record| record.shop_domain.clone());
        let created_at = previous_domain
            .and_then(|domain| stores.remove(&domain))
            .map_or_else(Utc::now, |record| record.created_at);

        let record = StoreRecord {
            shop_id: store.shop_id,
            shop_domain: store.shop_domain.clone(),
            access_token: store.access_token.clone(),
            scopes: store.scopes.clone(),
            created_at,
            updated_at: Utc::now(),
        };
        stores.insert(record.shop_domain.clone(), record.clone());

        Ok(record)
    }

    async fn delete_by_domain(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        Ok(self.stores.write().await.remove(shop).is_some())
    }

    async fn list(&self) -> Result<Vec<StoreRecord>, RepositoryError> {
        let mut stores: Vec<StoreRecord> = self.stores.read().await.values().cloned().collect();
        stores.sort_by(|a, b| a.shop_domain.as_str().cmp(b.shop_domain.as_str()));
        Ok(stores)
    }

    async fn health_check(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::{ExposeSecret, SecretString};
    use stock_sync_core::ShopId;

    use super::*;

    fn new_store(id: u64, domain: &str, token: &str) -> NewStore {
        NewStore {
            shop_id: ShopId::new(id),
            shop_domain: ShopDomain::parse(domain).unwrap(),
            access_token: SecretString::from(token),
            scopes: vec!["read_products".to_string()],
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_credential() {
        let directory = MemoryStoreDirectory::new();
        let first = directory
            .upsert(&new_store(1, "a.myshopify.com", "token-1"))
            .await
            .unwrap();
        let second = directory
            .upsert(&new_store(1, "a.myshopify.com", "token-2"))
            .await
            .unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.access_token.expose_secret(), "token-2");
        assert_eq!(directory.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_follows_domain_change() {
        let directory = MemoryStoreDirectory::new();
        directory
            .upsert(&new_store(1, "old.myshopify.com", "t"))
            .await
            .unwrap();
        directory
            .upsert(&new_store(1, "new.myshopify.com", "t"))
            .await
            .unwrap();

        let old = ShopDomain::parse("old.myshopify.com").unwrap();
        let new = ShopDomain::parse("new.myshopify.com").unwrap();
        assert!(directory.find_by_domain(&old).await.unwrap().is_none());
        assert!(directory.find_by_domain(&new).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_domain_conflict() {
        let directory = MemoryStoreDirectory::new();
        directory
            .upsert(&new_store(1, "a.myshopify.com", "t"))
            .await
            .unwrap();
        let result = directory.upsert(&new_store(2, "a.myshopify.com", "t")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let directory = MemoryStoreDirectory::new();
        let shop = ShopDomain::parse("a.myshopify.com").unwrap();
        directory
            .upsert(&new_store(1, "a.myshopify.com", "t"))
            .await
            .unwrap();

        assert!(directory.delete_by_domain(&shop).await.unwrap());
        assert!(!directory.delete_by_domain(&shop).await.unwrap());
    }
}
