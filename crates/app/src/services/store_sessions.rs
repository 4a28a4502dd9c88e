//! Cache of resolved stores and their platform clients.
//!
//! Every API request names a shop; resolving it means a directory lookup and
//! building an authenticated client. Both are cached per shop domain in a
//! bounded `moka` cache with idle expiry. Entries are dropped explicitly when
//! a store uninstalls or re-authenticates so a stale token is never reused.

use std::sync::Arc;

use moka::future::Cache;
use stock_sync_core::{Namespace, ShopDomain, ShopId};
use thiserror::Error;

use crate::config::StoreCacheConfig;
use crate::db::{RepositoryError, StoreDirectory, StoreRecord};
use crate::shopify::{CommercePlatform, PlatformConnector};

/// Errors resolving a store session.
#[derive(Debug, Error)]
pub enum StoreSessionError {
    /// The shop has not installed the app (or has uninstalled it).
    #[error("shop {0} has not installed the app")]
    NotInstalled(ShopDomain),

    /// The directory lookup failed.
    #[error(transparent)]
    Directory(#[from] RepositoryError),
}

/// A resolved store: identity, namespace and authenticated client.
pub struct StoreSession {
    shop_id: ShopId,
    shop_domain: ShopDomain,
    namespace: Namespace,
    platform: Arc<dyn CommercePlatform>,
}

impl StoreSession {
    /// Build a session for a directory record.
    #[must_use]
    pub fn new(record: &StoreRecord, platform: Arc<dyn CommercePlatform>) -> Self {
        Self {
            shop_id: record.shop_id,
            shop_domain: record.shop_domain.clone(),
            namespace: record.namespace(),
            platform,
        }
    }

    /// Platform-assigned shop id.
    #[must_use]
    pub const fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    /// Shop domain.
    #[must_use]
    pub const fn shop_domain(&self) -> &ShopDomain {
        &self.shop_domain
    }

    /// Metafield namespace for this store.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Authenticated platform client.
    #[must_use]
    pub fn platform(&self) -> &dyn CommercePlatform {
        self.platform.as_ref()
    }
}

impl std::fmt::Debug for StoreSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSession")
            .field("shop_id", &self.shop_id)
            .field("shop_domain", &self.shop_domain)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

/// Shared, bounded store session cache.
#[derive(Clone)]
pub struct StoreSessions {
    inner: Arc<StoreSessionsInner>,
}

struct StoreSessionsInner {
    cache: Cache<ShopDomain, Arc<StoreSession>>,
    directory: Arc<dyn StoreDirectory>,
    connector: Arc<dyn PlatformConnector>,
}

impl StoreSessions {
    /// Create an empty cache.
    #[must_use]
    pub fn new(
        config: StoreCacheConfig,
        directory: Arc<dyn StoreDirectory>,
        connector: Arc<dyn PlatformConnector>,
    ) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.capacity)
            .time_to_idle(config.time_to_idle)
            .build();

        Self {
            inner: Arc::new(StoreSessionsInner {
                cache,
                directory,
                connector,
            }),
        }
    }

    /// Resolve the session for `shop`, loading it from the directory on a
    /// miss.
    ///
    /// # Errors
    ///
    /// Returns `StoreSessionError::NotInstalled` for unknown shops (which are
    /// not cached) and `StoreSessionError::Directory` if the lookup fails.
    pub async fn resolve(&self, shop: &ShopDomain) -> Result<Arc<StoreSession>, StoreSessionError> {
        if let Some(session) = self.inner.cache.get(shop).await {
            return Ok(session);
        }

        let record = self
            .inner
            .directory
            .find_by_domain(shop)
            .await?
            .ok_or_else(|| StoreSessionError::NotInstalled(shop.clone()))?;

        let session = Arc::new(self.open(&record));
        self.inner
            .cache
            .insert(shop.clone(), Arc::clone(&session))
            .await;

        tracing::debug!(shop = %shop, "Store session cached");
        Ok(session)
    }

    /// Build a session for `record` without caching it.
    #[must_use]
    pub fn open(&self, record: &StoreRecord) -> StoreSession {
        let platform = self
            .inner
            .connector
            .connect(&record.shop_domain, &record.access_token);
        StoreSession::new(record, platform)
    }

    /// Drop any cached session for `shop`.
    pub async fn invalidate(&self, shop: &ShopDomain) {
        self.inner.cache.invalidate(shop).await;
    }

    /// The store directory behind this cache.
    #[must_use]
    pub fn directory(&self) -> &dyn StoreDirectory {
        self.inner.directory.as_ref()
    }

    /// The connector used to build platform clients.
    #[must_use]
    pub fn connector(&self) -> &dyn PlatformConnector {
        self.inner.connector.as_ref()
    }

    /// Whether `shop` currently has a cached session.
    #[must_use]
    pub fn is_cached(&self, shop: &ShopDomain) -> bool {
        self.inner.cache.contains_key(shop)
    }
}
