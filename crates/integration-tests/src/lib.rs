//! Integration test support for Stock Sync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p stock-sync-integration-tests
//! ```
//!
//! No database or Shopify store is needed: the store directory is the
//! in-memory implementation and the platform is [`FakePlatform`], which keeps
//! metafields in memory and records every call in order.
//!
//! # Test Categories
//!
//! - `sync_engine` - linkage operations and inventory propagation
//! - `schema` - metafield definition checks and rate-limit retries
//! - `store_sessions` - store session cache behavior
//! - `api_routes` - HTTP surface driven through `tower::ServiceExt::oneshot`
//! - `shopify_client` - Admin API client against a local axum server

use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::{Engine, engine::general_purpose::STANDARD, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use secrecy::SecretString;
use sha2::Sha256;
use stock_sync_app::config::{AppConfig, RetryConfig, ShopifyAppConfig, StoreCacheConfig};
use stock_sync_app::db::{MemoryStoreDirectory, NewStore, StoreDirectory, StoreRecord};
use stock_sync_app::shopify::{
    CommercePlatform, DefinitionOutcome, Metafield, MetafieldDefinition, PlatformConnector,
    ShopifyError,
};
use stock_sync_app::state::AppState;
use stock_sync_core::{
    InventoryQuantity, LinkageField, Namespace, ProductId, ShopDomain, ShopId,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

type HmacSha256 = Hmac<Sha256>;

/// Shop used by most tests.
pub const TEST_SHOP: &str = "a.myshopify.com";
/// Numeric id of [`TEST_SHOP`].
pub const TEST_SHOP_ID: u64 = 1001;
/// App API key in [`test_config`].
pub const TEST_API_KEY: &str = "test-api-key";
/// App API secret in [`test_config`].
pub const TEST_API_SECRET: &str = "test-api-secret-7c1f9e";
/// App handle in [`test_config`].
pub const TEST_APP_HANDLE: &str = "stock-sync";

/// Parse a product id.
///
/// # Panics
///
/// Panics on an invalid id.
#[must_use]
pub fn pid(id: &str) -> ProductId {
    ProductId::parse(id).unwrap_or_else(|e| panic!("invalid product id {id}: {e}"))
}

/// Parse a shop domain.
///
/// # Panics
///
/// Panics on an invalid domain.
#[must_use]
pub fn shop(domain: &str) -> ShopDomain {
    ShopDomain::parse(domain).unwrap_or_else(|e| panic!("invalid shop domain {domain}: {e}"))
}

/// Build a quantity.
///
/// # Panics
///
/// Panics on a negative quantity.
#[must_use]
pub fn qty(n: i64) -> InventoryQuantity {
    InventoryQuantity::new(n).unwrap_or_else(|e| panic!("invalid quantity: {e}"))
}

/// Namespace of [`TEST_SHOP`].
#[must_use]
pub fn test_namespace() -> Namespace {
    Namespace::for_shop(ShopId::new(TEST_SHOP_ID))
}

// =============================================================================
// Fake platform
// =============================================================================

/// A platform call, as recorded by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ReadMetafields(ProductId),
    SetMetafield {
        product: ProductId,
        key: &'static str,
        value: String,
    },
    DeleteMetafield(u64),
    SetInventory {
        product: ProductId,
        quantity: i64,
    },
    ListDefinitions,
    CreateDefinition(&'static str),
    GraphQL(String),
}

impl PlatformCall {
    /// Whether the call changes platform state.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(
            self,
            Self::SetMetafield { .. } | Self::DeleteMetafield(_) | Self::SetInventory { .. }
        )
    }
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    /// Keyed by (product, namespace, key).
    metafields: BTreeMap<(ProductId, String, String), Metafield>,
    definitions: Vec<MetafieldDefinition>,
    taken: HashSet<&'static str>,
    failing_inventory: HashSet<ProductId>,
    rate_limits_remaining: u32,
    calls: Vec<PlatformCall>,
}

/// In-memory commerce platform that records every call.
#[derive(Debug)]
pub struct FakePlatform {
    shop_id: ShopId,
    state: Mutex<FakeState>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self::new(TEST_SHOP_ID)
    }
}

impl FakePlatform {
    /// Create an empty platform for shop `shop_id`.
    #[must_use]
    pub fn new(shop_id: u64) -> Self {
        Self {
            shop_id: ShopId::new(shop_id),
            state: Mutex::new(FakeState {
                next_id: 1,
                ..FakeState::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a metafield without recording a call.
    pub fn seed(&self, product: &ProductId, namespace: &Namespace, field: LinkageField, value: &str) {
        let mut state = self.state();
        upsert_metafield(&mut state, product, namespace, field, value.to_string());
    }

    /// Make `set_product_inventory` fail for `product`.
    pub fn fail_inventory_for(&self, product: &ProductId) {
        self.state().failing_inventory.insert(product.clone());
    }

    /// Answer the next `n` definition calls with a rate limit.
    pub fn rate_limit_next(&self, n: u32) {
        self.state().rate_limits_remaining = n;
    }

    /// Seed an existing definition.
    pub fn seed_definition(&self, namespace: &Namespace, field: LinkageField) {
        let mut state = self.state();
        let id = state.definitions.len() + 1;
        state.definitions.push(MetafieldDefinition {
            id: format!("gid://shopify/MetafieldDefinition/{id}"),
            namespace: namespace.to_string(),
            key: field.key().to_string(),
        });
    }

    /// Make creating `field` fail with `TAKEN`, as if created concurrently.
    pub fn mark_taken(&self, field: LinkageField) {
        self.state().taken.insert(field.key());
    }

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// Only the calls that change platform state.
    #[must_use]
    pub fn writes(&self) -> Vec<PlatformCall> {
        self.calls().into_iter().filter(PlatformCall::is_write).collect()
    }

    /// Inventory calls as `(product, quantity)`, in order.
    #[must_use]
    pub fn inventory_calls(&self) -> Vec<(ProductId, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::SetInventory { product, quantity } => Some((product, quantity)),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded calls (seeded data is kept).
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Current value of a metafield.
    #[must_use]
    pub fn metafield(
        &self,
        product: &ProductId,
        namespace: &Namespace,
        field: LinkageField,
    ) -> Option<String> {
        self.state()
            .metafields
            .get(&(product.clone(), namespace.to_string(), field.key().to_string()))
            .map(|m| m.value.clone())
    }

    /// Keys of the definitions that exist.
    #[must_use]
    pub fn definition_keys(&self) -> Vec<String> {
        self.state().definitions.iter().map(|d| d.key.clone()).collect()
    }

    fn take_rate_limit(state: &mut FakeState) -> Result<(), ShopifyError> {
        if state.rate_limits_remaining > 0 {
            state.rate_limits_remaining -= 1;
            return Err(ShopifyError::RateLimited(2));
        }
        Ok(())
    }
}

fn upsert_metafield(
    state: &mut FakeState,
    product: &ProductId,
    namespace: &Namespace,
    field: LinkageField,
    value: String,
) {
    let key = (product.clone(), namespace.to_string(), field.key().to_string());
    if let Some(existing) = state.metafields.get_mut(&key) {
        existing.value = value;
        return;
    }

    let id = state.next_id;
    state.next_id += 1;
    state.metafields.insert(
        key,
        Metafield {
            id,
            namespace: namespace.to_string(),
            key: field.key().to_string(),
            value,
            value_type: field.metafield_type().to_string(),
        },
    );
}

#[async_trait]
impl CommercePlatform for FakePlatform {
    async fn shop_id(&self) -> Result<ShopId, ShopifyError> {
        Ok(self.shop_id)
    }

    async fn product_metafields(
        &self,
        product: &ProductId,
        namespace: &Namespace,
    ) -> Result<Vec<Metafield>, ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::ReadMetafields(product.clone()));
        Ok(state
            .metafields
            .iter()
            .filter(|((p, ns, _), _)| p == product && ns == namespace.as_str())
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn set_product_metafield(
        &self,
        product: &ProductId,
        namespace: &Namespace,
        field: LinkageField,
        value: String,
    ) -> Result<(), ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::SetMetafield {
            product: product.clone(),
            key: field.key(),
            value: value.clone(),
        });
        upsert_metafield(&mut state, product, namespace, field, value);
        Ok(())
    }

    async fn delete_metafield(&self, metafield_id: u64) -> Result<(), ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::DeleteMetafield(metafield_id));
        let before = state.metafields.len();
        state.metafields.retain(|_, m| m.id != metafield_id);
        if state.metafields.len() == before {
            return Err(ShopifyError::NotFound(format!("metafields/{metafield_id}.json")));
        }
        Ok(())
    }

    async fn set_product_inventory(
        &self,
        product: &ProductId,
        quantity: InventoryQuantity,
    ) -> Result<(), ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::SetInventory {
            product: product.clone(),
            quantity: quantity.get(),
        });
        if state.failing_inventory.contains(product) {
            return Err(ShopifyError::NotFound(format!("products/{product}.json")));
        }
        Ok(())
    }

    async fn metafield_definitions(
        &self,
        namespace: &Namespace,
    ) -> Result<Vec<MetafieldDefinition>, ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::ListDefinitions);
        Self::take_rate_limit(&mut state)?;
        Ok(state
            .definitions
            .iter()
            .filter(|d| d.namespace == namespace.as_str())
            .cloned()
            .collect())
    }

    async fn create_metafield_definition(
        &self,
        namespace: &Namespace,
        field: LinkageField,
    ) -> Result<DefinitionOutcome, ShopifyError> {
        let mut state = self.state();
        state.calls.push(PlatformCall::CreateDefinition(field.key()));
        Self::take_rate_limit(&mut state)?;

        if state.taken.contains(field.key()) {
            return Ok(DefinitionOutcome::AlreadyExists);
        }

        let id = state.definitions.len() + 1;
        state.definitions.push(MetafieldDefinition {
            id: format!("gid://shopify/MetafieldDefinition/{id}"),
            namespace: namespace.to_string(),
            key: field.key().to_string(),
        });
        Ok(DefinitionOutcome::Created)
    }

    async fn graphql(
        &self,
        query: &str,
        variables: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ShopifyError> {
        self.state().calls.push(PlatformCall::GraphQL(query.to_string()));
        Ok(serde_json::json!({
            "data": { "echo": query, "variables": variables }
        }))
    }
}

/// Connector that hands out the same [`FakePlatform`] for every store.
#[derive(Debug, Clone)]
pub struct FakeConnector {
    platform: Arc<FakePlatform>,
    connections: Arc<Mutex<Vec<ShopDomain>>>,
}

impl FakeConnector {
    /// Wrap `platform`.
    #[must_use]
    pub fn new(platform: Arc<FakePlatform>) -> Self {
        Self {
            platform,
            connections: Arc::default(),
        }
    }

    /// Shops a client was built for, in order.
    #[must_use]
    pub fn connections(&self) -> Vec<ShopDomain> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PlatformConnector for FakeConnector {
    fn connect(&self, shop: &ShopDomain, _access_token: &SecretString) -> Arc<dyn CommercePlatform> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(shop.clone());
        Arc::clone(&self.platform) as Arc<dyn CommercePlatform>
    }
}

// =============================================================================
// App fixtures
// =============================================================================

/// Configuration for router tests.
///
/// Session tokens are required unless `allow_shop_header` is set.
#[must_use]
pub fn test_config(allow_shop_header: bool) -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://localhost/stock_sync_test"),
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 5000,
        base_url: "https://stock-sync.test".to_string(),
        static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/ui")),
        allow_shop_header,
        shopify: ShopifyAppConfig {
            api_key: TEST_API_KEY.to_string(),
            api_secret: SecretString::from(TEST_API_SECRET),
            app_handle: TEST_APP_HANDLE.to_string(),
            api_version: "2025-01".to_string(),
            scopes: vec!["read_products".to_string(), "write_inventory".to_string()],
        },
        store_cache: StoreCacheConfig {
            capacity: 100,
            time_to_idle: Duration::from_secs(60),
        },
        schema_retry: RetryConfig {
            attempts: 3,
            delay: Duration::from_millis(1),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Everything a router test needs.
pub struct TestApp {
    pub state: AppState,
    pub directory: Arc<MemoryStoreDirectory>,
    pub platform: Arc<FakePlatform>,
    pub connector: FakeConnector,
}

impl TestApp {
    /// Build app state over an in-memory directory and a fake platform.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let directory = Arc::new(MemoryStoreDirectory::new());
        let platform = Arc::new(FakePlatform::default());
        let connector = FakeConnector::new(Arc::clone(&platform));

        let state = AppState::new(
            config,
            Arc::clone(&directory) as Arc<dyn StoreDirectory>,
            Arc::new(connector.clone()),
            reqwest::Client::new(),
        );

        Self {
            state,
            directory,
            platform,
            connector,
        }
    }

    /// Record [`TEST_SHOP`] as installed.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory directory rejects the store.
    pub async fn install_test_shop(&self) -> StoreRecord {
        self.directory
            .upsert(&NewStore {
                shop_id: ShopId::new(TEST_SHOP_ID),
                shop_domain: shop(TEST_SHOP),
                access_token: SecretString::from("shpat_test"),
                scopes: vec!["read_products".to_string()],
            })
            .await
            .unwrap_or_else(|e| panic!("failed to install test shop: {e}"))
    }

    /// The full router, with an in-memory session store.
    #[must_use]
    pub fn router(&self) -> Router {
        stock_sync_app::app(
            self.state.clone(),
            SessionManagerLayer::new(MemoryStore::default()).with_secure(false),
        )
    }
}

// =============================================================================
// Signing helpers
// =============================================================================

fn mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|e| panic!("invalid HMAC key: {e}"))
}

/// Base64 HMAC-SHA256 of a webhook body.
#[must_use]
pub fn sign_webhook(body: &[u8], secret: &str) -> String {
    let mut mac = mac(secret);
    mac.update(body);
    STANDARD.encode(mac.finalize().into_bytes())
}

/// A query string signed the way Shopify signs app URLs and OAuth callbacks.
///
/// Values must not need percent-encoding.
#[must_use]
pub fn signed_query(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let message = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut mac = mac(secret);
    mac.update(message.as_bytes());
    let hmac = hex::encode(mac.finalize().into_bytes());

    format!("{message}&hmac={hmac}")
}

/// An App Bridge session token for `shop`, valid for one minute.
#[must_use]
pub fn session_token(shop: &str, api_key: &str, secret: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(
        serde_json::json!({
            "iss": format!("https://{shop}/admin"),
            "dest": format!("https://{shop}"),
            "aud": api_key,
            "sub": "1",
            "exp": now + 60,
            "nbf": now - 5,
            "iat": now - 5,
            "jti": uuid::Uuid::new_v4().to_string(),
            "sid": "session-id",
        })
        .to_string(),
    );

    let mut mac = mac(secret);
    mac.update(format!("{header}.{claims}").as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{header}.{claims}.{signature}")
}
