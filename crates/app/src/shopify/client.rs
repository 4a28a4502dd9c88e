//! Authenticated Admin API client for one store.

use std::sync::Arc;

use graphql_client::GraphQLQuery;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use stock_sync_core::{InventoryQuantity, LinkageField, Namespace, ProductId, ShopDomain, ShopId};
use tokio::sync::OnceCell;
use tracing::instrument;

use super::queries::{
    self, MetafieldDefinitionCreate, MetafieldDefinitions, MetafieldsSet, ShopIdentity,
    join_user_errors,
};
use super::types::{
    InventoryLevelSet, Metafield, MetafieldDefinition, MetafieldsEnvelope, ProductEnvelope,
    ProductVariant, ShopEnvelope,
};
use super::{DefinitionOutcome, GraphQLError, GraphQLErrorLocation, ShopifyError};

const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Default wait when Shopify omits `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Longest error body kept in [`ShopifyError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Shopify Admin API client bound to one store and access token.
///
/// Cheap to clone. The shop's primary location is looked up once and cached
/// for the lifetime of the client.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    http: reqwest::Client,
    shop: ShopDomain,
    base_url: String,
    access_token: SecretString,
    api_version: String,
    primary_location: OnceCell<u64>,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("shop", &self.inner.shop)
            .field("api_version", &self.inner.api_version)
            .field("access_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    locations: Vec<GraphQLErrorLocationResponse>,
    #[serde(default)]
    path: Vec<serde_json::Value>,
    #[serde(default)]
    extensions: Option<serde_json::Value>,
}

impl GraphQLErrorResponse {
    fn is_throttled(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .and_then(serde_json::Value::as_str)
            == Some("THROTTLED")
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorLocationResponse {
    line: i64,
    column: i64,
}

impl ShopifyClient {
    /// Create a client for `shop` authenticated with `access_token`.
    #[must_use]
    pub fn new(
        http: reqwest::Client,
        shop: ShopDomain,
        access_token: SecretString,
        api_version: impl Into<String>,
    ) -> Self {
        let base_url = format!("https://{shop}");
        Self::with_base_url(http, shop, access_token, api_version, base_url)
    }

    /// Create a client that sends requests to `base_url` instead of the
    /// shop's own host. Used to point the client at a local server.
    #[must_use]
    pub fn with_base_url(
        http: reqwest::Client,
        shop: ShopDomain,
        access_token: SecretString,
        api_version: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                shop,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                access_token,
                api_version: api_version.into(),
                primary_location: OnceCell::new(),
            }),
        }
    }

    /// The store this client talks to.
    #[must_use]
    pub fn shop(&self) -> &ShopDomain {
        &self.inner.shop
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/admin/api/{}/{}",
            self.inner.base_url, self.inner.api_version, path
        )
    }

    fn rest_product_id(product: &ProductId) -> Result<u64, ShopifyError> {
        product
            .numeric()
            .ok_or_else(|| ShopifyError::NotFound(format!("product {product}")))
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// Map non-success statuses onto `ShopifyError`.
    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ShopifyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after)
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Err(ShopifyError::RateLimited(retry_after))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            )),
            StatusCode::NOT_FOUND => Err(ShopifyError::NotFound(response.url().path().to_string())),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(ShopifyError::Status {
                    status: status.as_u16(),
                    body: truncate_error_body(body),
                })
            }
        }
    }

    async fn rest_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ShopifyError> {
        let response = self
            .inner
            .http
            .get(self.api_url(path))
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .query(query)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    /// Execute a GraphQL operation.
    async fn execute<Q: GraphQLQuery>(
        &self,
        variables: Q::Variables,
    ) -> Result<Q::ResponseData, ShopifyError>
    where
        Q::ResponseData: DeserializeOwned,
    {
        let body = Q::build_query(variables);

        let response = self
            .inner
            .http
            .post(self.api_url("graphql.json"))
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        let graphql_response: GraphQLResponse<Q::ResponseData> =
            Self::check_status(response).await?.json().await?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            if errors.iter().any(GraphQLErrorResponse::is_throttled) {
                return Err(ShopifyError::RateLimited(DEFAULT_RETRY_AFTER_SECS));
            }

            let converted_errors: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    locations: e
                        .locations
                        .into_iter()
                        .map(|l| GraphQLErrorLocation {
                            line: l.line,
                            column: l.column,
                        })
                        .collect(),
                    path: e.path,
                })
                .collect();
            return Err(ShopifyError::GraphQL(converted_errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                locations: vec![],
                path: vec![],
            }])
        })
    }

    /// Forward an arbitrary GraphQL document and return Shopify's response
    /// body untouched (including any `errors`).
    ///
    /// # Errors
    ///
    /// Returns an error on transport failures and non-success statuses.
    #[instrument(skip(self, query, variables), fields(shop = %self.inner.shop))]
    pub async fn graphql_passthrough(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ShopifyError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables.unwrap_or(serde_json::Value::Null),
        });

        let response = self
            .inner
            .http
            .post(self.api_url("graphql.json"))
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }

    // =========================================================================
    // Shop
    // =========================================================================

    /// Fetch the platform-assigned shop id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the id cannot be parsed.
    #[instrument(skip(self), fields(shop = %self.inner.shop))]
    pub async fn shop_id(&self) -> Result<ShopId, ShopifyError> {
        let data = self
            .execute::<ShopIdentity>(queries::shop_identity::Variables)
            .await?;
        ShopId::parse(&data.shop.id).map_err(|e| ShopifyError::UserError(e.to_string()))
    }

    /// The shop's primary location, fetched once per client.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the shop has no primary
    /// location.
    pub async fn primary_location_id(&self) -> Result<u64, ShopifyError> {
        self.inner
            .primary_location
            .get_or_try_init(|| async {
                let envelope: ShopEnvelope = self
                    .rest_get("shop.json", &[("fields", "primary_location_id")])
                    .await?;
                envelope
                    .shop
                    .primary_location_id
                    .ok_or_else(|| ShopifyError::NotFound("primary location".to_string()))
            })
            .await
            .copied()
    }

    // =========================================================================
    // Metafields
    // =========================================================================

    /// List a product's metafields in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.shop, product_id = %product))]
    pub async fn product_metafields(
        &self,
        product: &ProductId,
        namespace: &Namespace,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        let id = Self::rest_product_id(product)?;
        let envelope: MetafieldsEnvelope = self
            .rest_get(
                &format!("products/{id}/metafields.json"),
                &[("namespace", namespace.as_str()), ("limit", "250")],
            )
            .await?;

        Ok(envelope
            .metafields
            .into_iter()
            .filter(|m| m.namespace == namespace.as_str())
            .collect())
    }

    /// Create or replace a linkage metafield on a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Shopify rejects the value.
    #[instrument(skip(self, value), fields(shop = %self.inner.shop, product_id = %product, key = field.key()))]
    pub async fn set_product_metafield(
        &self,
        product: &ProductId,
        namespace: &Namespace,
        field: LinkageField,
        value: String,
    ) -> Result<(), ShopifyError> {
        let variables = queries::metafields_set::Variables {
            metafields: vec![queries::metafields_set::MetafieldsSetInput {
                owner_id: product.gid(),
                namespace: namespace.as_str().to_string(),
                key: field.key().to_string(),
                value_type: field.metafield_type().to_string(),
                value,
            }],
        };

        let response = self.execute::<MetafieldsSet>(variables).await?;

        if let Some(payload) = response.metafields_set
            && !payload.user_errors.is_empty()
        {
            return Err(ShopifyError::UserError(join_user_errors(
                &payload.user_errors,
            )));
        }

        Ok(())
    }

    /// Delete a metafield by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.shop))]
    pub async fn delete_metafield(&self, metafield_id: u64) -> Result<(), ShopifyError> {
        let response = self
            .inner
            .http
            .delete(self.api_url(&format!("metafields/{metafield_id}.json")))
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// List product metafield definitions in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(shop = %self.inner.shop))]
    pub async fn metafield_definitions(
        &self,
        namespace: &Namespace,
    ) -> Result<Vec<MetafieldDefinition>, ShopifyError> {
        let variables = queries::metafield_definitions::Variables {
            namespace: namespace.as_str().to_string(),
        };

        let response = self.execute::<MetafieldDefinitions>(variables).await?;
        Ok(response.metafield_definitions.nodes)
    }

    /// Create the product metafield definition for `field`.
    ///
    /// A `TAKEN` user error means another request created it first and is
    /// reported as [`DefinitionOutcome::AlreadyExists`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Shopify rejects the
    /// definition for any other reason.
    #[instrument(skip(self), fields(shop = %self.inner.shop, key = field.key()))]
    pub async fn create_metafield_definition(
        &self,
        namespace: &Namespace,
        field: LinkageField,
    ) -> Result<DefinitionOutcome, ShopifyError> {
        let variables = queries::metafield_definition_create::Variables {
            definition: queries::metafield_definition_create::MetafieldDefinitionInput {
                name: field.display_name().to_string(),
                namespace: namespace.as_str().to_string(),
                key: field.key().to_string(),
                description: field.description().to_string(),
                value_type: field.metafield_type().to_string(),
                owner_type: "PRODUCT",
            },
        };

        let response = self.execute::<MetafieldDefinitionCreate>(variables).await?;

        let Some(payload) = response.metafield_definition_create else {
            return Err(ShopifyError::UserError(
                "metafieldDefinitionCreate returned no payload".to_string(),
            ));
        };

        if payload.user_errors.is_empty() {
            return Ok(DefinitionOutcome::Created);
        }

        if payload
            .user_errors
            .iter()
            .all(|e| e.code.as_deref() == Some("TAKEN"))
        {
            return Ok(DefinitionOutcome::AlreadyExists);
        }

        Err(ShopifyError::UserError(join_user_errors(
            &payload.user_errors,
        )))
    }

    // =========================================================================
    // Inventory
    // =========================================================================

    /// Variants of a product with their inventory items.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn product_variants(
        &self,
        product: &ProductId,
    ) -> Result<Vec<ProductVariant>, ShopifyError> {
        let id = Self::rest_product_id(product)?;
        let envelope: ProductEnvelope = self
            .rest_get(&format!("products/{id}.json"), &[("fields", "id,variants")])
            .await?;
        Ok(envelope.product.variants)
    }

    /// Set the available quantity of one inventory item at a location.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn set_inventory_level(
        &self,
        location_id: u64,
        inventory_item_id: u64,
        quantity: InventoryQuantity,
    ) -> Result<(), ShopifyError> {
        let body = InventoryLevelSet {
            location_id,
            inventory_item_id,
            available: quantity.get(),
        };

        let response = self
            .inner
            .http
            .post(self.api_url("inventory_levels/set.json"))
            .header(ACCESS_TOKEN_HEADER, self.inner.access_token.expose_secret())
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    /// Set every variant of `product` to `quantity` at the primary location.
    ///
    /// # Errors
    ///
    /// Returns an error if the product has no variants or any call fails.
    /// Variants are updated in order; a failure stops at that variant.
    #[instrument(skip(self), fields(shop = %self.inner.shop, product_id = %product, quantity = quantity.get()))]
    pub async fn set_product_inventory(
        &self,
        product: &ProductId,
        quantity: InventoryQuantity,
    ) -> Result<(), ShopifyError> {
        let variants = self.product_variants(product).await?;
        if variants.is_empty() {
            return Err(ShopifyError::NotFound(format!(
                "variants for product {product}"
            )));
        }

        let location_id = self.primary_location_id().await?;
        for variant in &variants {
            self.set_inventory_level(location_id, variant.inventory_item_id, quantity)
                .await?;
        }

        tracing::debug!(variants = variants.len(), "Inventory set");
        Ok(())
    }
}

/// Cut `body` to at most [`MAX_ERROR_BODY`] bytes on a char boundary.
fn truncate_error_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|&i| body.is_char_boundary(i))
            .unwrap_or(0);
        body.truncate(cut);
    }
    body
}

/// Parse `Retry-After`, which Shopify sends as seconds (sometimes fractional).
fn parse_retry_after(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // checked non-negative
    Some(seconds.ceil() as u64)
}
