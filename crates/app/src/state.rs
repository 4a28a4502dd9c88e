//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::StoreDirectory;
use crate::services::StoreSessions;
use crate::shopify::{OAuthClient, PlatformConnector, RetryPolicy};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    stores: StoreSessions,
    oauth: OAuthClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - App configuration
    /// * `directory` - Store credential persistence
    /// * `connector` - Builds platform clients from store credentials
    /// * `http` - Shared HTTP client for OAuth calls
    #[must_use]
    pub fn new(
        config: AppConfig,
        directory: Arc<dyn StoreDirectory>,
        connector: Arc<dyn PlatformConnector>,
        http: reqwest::Client,
    ) -> Self {
        let stores = StoreSessions::new(config.store_cache, directory, connector);
        let oauth = OAuthClient::new(http, &config.shopify, config.oauth_redirect_uri());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                stores,
                oauth,
            }),
        }
    }

    /// Get a reference to the app configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get the store session cache.
    #[must_use]
    pub fn stores(&self) -> &StoreSessions {
        &self.inner.stores
    }

    /// Get the store directory.
    #[must_use]
    pub fn directory(&self) -> &dyn StoreDirectory {
        self.inner.stores.directory()
    }

    /// Get the OAuth client.
    #[must_use]
    pub fn oauth(&self) -> &OAuthClient {
        &self.inner.oauth
    }

    /// Retry policy for metafield definition calls.
    #[must_use]
    pub fn schema_retry(&self) -> RetryPolicy {
        RetryPolicy::from(self.inner.config.schema_retry)
    }
}
