//! The platform operations the sync engine depends on.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use stock_sync_core::{InventoryQuantity, LinkageField, Namespace, ProductId, ShopDomain, ShopId};

use super::{Metafield, MetafieldDefinition, ShopifyClient, ShopifyError};

/// Result of creating a metafield definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionOutcome {
    /// The definition was created by this call.
    Created,
    /// The definition already existed.
    AlreadyExists,
}

/// Commerce platform operations for one authenticated store.
#[async_trait]
pub trait CommercePlatform: Send + Sync {
    /// Platform-assigned shop id.
    async fn shop_id(&self) -> Result<ShopId, ShopifyError>;

    /// A product's metafields in `namespace`.
    async fn product_metafields(
        &self,
        product: &ProductId,
        namespace: &Namespace,
    ) -> Result<Vec<Metafield>, ShopifyError>;

    /// Create or replace one linkage metafield.
    async fn set_product_metafield(
        &self,
        product: &ProductId,
        namespace: &Namespace,
        field: LinkageField,
        value: String,
    ) -> Result<(), ShopifyError>;

    /// Delete a metafield by id.
    async fn delete_metafield(&self, metafield_id: u64) -> Result<(), ShopifyError>;

    /// Set the available quantity of every variant of `product`.
    async fn set_product_inventory(
        &self,
        product: &ProductId,
        quantity: InventoryQuantity,
    ) -> Result<(), ShopifyError>;

    /// Product metafield definitions in `namespace`.
    async fn metafield_definitions(
        &self,
        namespace: &Namespace,
    ) -> Result<Vec<MetafieldDefinition>, ShopifyError>;

    /// Create the definition for `field`.
    async fn create_metafield_definition(
        &self,
        namespace: &Namespace,
        field: LinkageField,
    ) -> Result<DefinitionOutcome, ShopifyError>;

    /// Run a GraphQL document and return the raw response body.
    async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ShopifyError>;
}

#[async_trait]
impl CommercePlatform for ShopifyClient {
    async fn shop_id(&self) -> Result<ShopId, ShopifyError> {
        Self::shop_id(self).await
    }

    async fn product_metafields(
        &self,
        product: &ProductId,
        namespace: &Namespace,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        Self::product_metafields(self, product, namespace).await
    }

    async fn set_product_metafield(
        &self,
        product: &ProductId,
        namespace: &Namespace,
        field: LinkageField,
        value: String,
    ) -> Result<(), ShopifyError> {
        Self::set_product_metafield(self, product, namespace, field, value).await
    }

    async fn delete_metafield(&self, metafield_id: u64) -> Result<(), ShopifyError> {
        Self::delete_metafield(self, metafield_id).await
    }

    async fn set_product_inventory(
        &self,
        product: &ProductId,
        quantity: InventoryQuantity,
    ) -> Result<(), ShopifyError> {
        Self::set_product_inventory(self, product, quantity).await
    }

    async fn metafield_definitions(
        &self,
        namespace: &Namespace,
    ) -> Result<Vec<MetafieldDefinition>, ShopifyError> {
        Self::metafield_definitions(self, namespace).await
    }

    async fn create_metafield_definition(
        &self,
        namespace: &Namespace,
        field: LinkageField,
    ) -> Result<DefinitionOutcome, ShopifyError> {
        Self::create_metafield_definition(self, namespace, field).await
    }

    async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ShopifyError> {
        self.graphql_passthrough(query, variables).await
    }
}

/// Builds a platform client from a store's credentials.
pub trait PlatformConnector: Send + Sync {
    /// Connect to `shop` with `access_token`.
    fn connect(&self, shop: &ShopDomain, access_token: &SecretString)
    -> Arc<dyn CommercePlatform>;
}

/// Connects to the real Shopify Admin API, sharing one HTTP connection pool.
#[derive(Debug, Clone)]
pub struct ShopifyConnector {
    http: reqwest::Client,
    api_version: String,
}

impl ShopifyConnector {
    /// Create a connector for `api_version`.
    #[must_use]
    pub fn new(http: reqwest::Client, api_version: impl Into<String>) -> Self {
        Self {
            http,
            api_version: api_version.into(),
        }
    }

    /// Build a concrete client (used where the full client API is needed).
    #[must_use]
    pub fn client(&self, shop: &ShopDomain, access_token: &SecretString) -> ShopifyClient {
        ShopifyClient::new(
            self.http.clone(),
            shop.clone(),
            access_token.clone(),
            self.api_version.clone(),
        )
    }
}

impl PlatformConnector for ShopifyConnector {
    fn connect(
        &self,
        shop: &ShopDomain,
        access_token: &SecretString,
    ) -> Arc<dyn CommercePlatform> {
        Arc::new(self.client(shop, access_token))
    }
}
