//! Admin API client against a local stand-in for the shop's API.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use secrecy::SecretString;
use serde_json::{Value, json};
use stock_sync_app::shopify::{ShopifyClient, ShopifyError};
use stock_sync_core::LinkageField;
use stock_sync_integration_tests::{TEST_SHOP, pid, qty, shop, test_namespace};

const API_VERSION: &str = "2025-01";
const ACCESS_TOKEN: &str = "shpat_local_test_token";

/// Requests seen by the local API and the replies it gives.
#[derive(Clone, Default)]
struct AdminApi {
    inner: Arc<AdminApiInner>,
}

#[derive(Default)]
struct AdminApiInner {
    shop_lookups: AtomicUsize,
    inventory_sets: Mutex<Vec<Value>>,
    graphql_bodies: Mutex<Vec<Value>>,
    graphql_reply: Mutex<Value>,
    deleted: Mutex<Vec<String>>,
    tokens: Mutex<Vec<String>>,
}

impl AdminApi {
    fn reply_to_graphql(&self, reply: Value) {
        *self.inner.graphql_reply.lock().unwrap() = reply;
    }

    fn inventory_sets(&self) -> Vec<Value> {
        self.inner.inventory_sets.lock().unwrap().clone()
    }

    fn graphql_bodies(&self) -> Vec<Value> {
        self.inner.graphql_bodies.lock().unwrap().clone()
    }

    fn shop_lookups(&self) -> usize {
        self.inner.shop_lookups.load(Ordering::SeqCst)
    }

    fn record_token(&self, headers: &HeaderMap) {
        let token = headers
            .get("x-shopify-access-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.inner.tokens.lock().unwrap().push(token);
    }
}

async fn product_with_variants() -> Json<Value> {
    Json(json!({"product": {"id": 1, "variants": [
        {"id": 11, "inventory_item_id": 111},
        {"id": 12, "inventory_item_id": 112}
    ]}}))
}

async fn product_without_variants() -> Json<Value> {
    Json(json!({"product": {"id": 2, "variants": []}}))
}

async fn product_server_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("{}é erreur interne", "a".repeat(511)),
    )
}

async fn product_metafields() -> Json<Value> {
    let ns = test_namespace();
    Json(json!({"metafields": [
        {"id": 5, "namespace": ns.as_str(), "key": "is_sync_master", "value": true, "type": "boolean"},
        {"id": 6, "namespace": "other_app", "key": "is_sync_master", "value": "false", "type": "boolean"}
    ]}))
}

async fn shop_location(State(api): State<AdminApi>) -> Json<Value> {
    api.inner.shop_lookups.fetch_add(1, Ordering::SeqCst);
    Json(json!({"shop": {"primary_location_id": 77}}))
}

async fn set_inventory_level(
    State(api): State<AdminApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    api.record_token(&headers);
    api.inner.inventory_sets.lock().unwrap().push(body.clone());
    Json(json!({"inventory_level": body}))
}

async fn graphql(State(api): State<AdminApi>, Json(body): Json<Value>) -> Json<Value> {
    api.inner.graphql_bodies.lock().unwrap().push(body);
    Json(api.inner.graphql_reply.lock().unwrap().clone())
}

async fn delete_metafield(State(api): State<AdminApi>, uri: Uri) -> Json<Value> {
    api.inner.deleted.lock().unwrap().push(uri.path().to_string());
    Json(json!({}))
}

/// Serve the local API and return a client pointed at it.
async fn client_for(api: &AdminApi) -> ShopifyClient {
    let prefix = format!("/admin/api/{API_VERSION}");
    let router = Router::new()
        .route(&format!("{prefix}/products/1.json"), get(product_with_variants))
        .route(&format!("{prefix}/products/2.json"), get(product_without_variants))
        .route(&format!("{prefix}/products/3.json"), get(product_server_error))
        .route(
            &format!("{prefix}/products/1/metafields.json"),
            get(product_metafields),
        )
        .route(&format!("{prefix}/shop.json"), get(shop_location))
        .route(
            &format!("{prefix}/inventory_levels/set.json"),
            post(set_inventory_level),
        )
        .route(&format!("{prefix}/graphql.json"), post(graphql))
        .route(&format!("{prefix}/metafields/9.json"), delete(delete_metafield))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    ShopifyClient::with_base_url(
        reqwest::Client::new(),
        shop(TEST_SHOP),
        SecretString::from(ACCESS_TOKEN),
        API_VERSION,
        format!("http://{addr}"),
    )
}

#[tokio::test]
async fn test_set_product_inventory_updates_every_variant() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    client.set_product_inventory(&pid("1"), qty(42)).await.unwrap();

    assert_eq!(
        api.inventory_sets(),
        vec![
            json!({"location_id": 77, "inventory_item_id": 111, "available": 42}),
            json!({"location_id": 77, "inventory_item_id": 112, "available": 42}),
        ]
    );
    assert_eq!(
        *api.inner.tokens.lock().unwrap(),
        vec![ACCESS_TOKEN.to_string(), ACCESS_TOKEN.to_string()]
    );
}

#[tokio::test]
async fn test_primary_location_is_looked_up_once() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    client.set_product_inventory(&pid("1"), qty(1)).await.unwrap();
    client.set_product_inventory(&pid("1"), qty(2)).await.unwrap();

    assert_eq!(api.shop_lookups(), 1);
    assert_eq!(api.inventory_sets().len(), 4);
}

#[tokio::test]
async fn test_product_without_variants_is_not_found() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    let err = client
        .set_product_inventory(&pid("2"), qty(5))
        .await
        .unwrap_err();

    assert!(matches!(err, ShopifyError::NotFound(_)));
    assert!(api.inventory_sets().is_empty());
    assert_eq!(api.shop_lookups(), 0);
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    let err = client
        .set_product_inventory(&pid("404"), qty(5))
        .await
        .unwrap_err();

    assert!(matches!(err, ShopifyError::NotFound(_)));
}

#[tokio::test]
async fn test_server_error_body_with_multibyte_text() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    let err = client
        .set_product_inventory(&pid("3"), qty(5))
        .await
        .unwrap_err();

    match err {
        ShopifyError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "a".repeat(511));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_product_metafields_keeps_own_namespace() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    let metafields = client
        .product_metafields(&pid("1"), &test_namespace())
        .await
        .unwrap();

    assert_eq!(metafields.len(), 1);
    assert_eq!(metafields[0].id, 5);
    assert_eq!(metafields[0].value, "true");
}

#[tokio::test]
async fn test_set_product_metafield_sends_upsert() {
    let api = AdminApi::default();
    api.reply_to_graphql(json!({"data": {"metafieldsSet": {
        "metafields": [{"id": "gid://shopify/Metafield/1", "key": "is_sync_master", "namespace": "stock_sync_1001"}],
        "userErrors": []
    }}}));
    let client = client_for(&api).await;

    client
        .set_product_metafield(
            &pid("1"),
            &test_namespace(),
            LinkageField::IsSyncMaster,
            "true".to_string(),
        )
        .await
        .unwrap();

    let bodies = api.graphql_bodies();
    assert_eq!(bodies.len(), 1);
    let input = &bodies[0]["variables"]["metafields"][0];
    assert_eq!(input["ownerId"], "gid://shopify/Product/1");
    assert_eq!(input["namespace"], "stock_sync_1001");
    assert_eq!(input["key"], "is_sync_master");
    assert_eq!(input["type"], "boolean");
    assert_eq!(input["value"], "true");
}

#[tokio::test]
async fn test_set_product_metafield_user_errors() {
    let api = AdminApi::default();
    api.reply_to_graphql(json!({"data": {"metafieldsSet": {
        "metafields": [],
        "userErrors": [
            {"field": ["metafields", "0", "value"], "message": "Value is invalid", "code": "INVALID_VALUE"},
            {"field": null, "message": "Owner not found", "code": null}
        ]
    }}}));
    let client = client_for(&api).await;

    let err = client
        .set_product_metafield(
            &pid("1"),
            &test_namespace(),
            LinkageField::SyncState,
            "{}".to_string(),
        )
        .await
        .unwrap_err();

    match err {
        ShopifyError::UserError(message) => {
            assert_eq!(message, "Value is invalid; Owner not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_throttled_graphql_is_rate_limited() {
    let api = AdminApi::default();
    api.reply_to_graphql(json!({
        "errors": [{"message": "Throttled", "extensions": {"code": "THROTTLED"}}]
    }));
    let client = client_for(&api).await;

    let err = client
        .set_product_metafield(
            &pid("1"),
            &test_namespace(),
            LinkageField::IsSyncMaster,
            "true".to_string(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ShopifyError::RateLimited(_)));
}

#[tokio::test]
async fn test_delete_metafield() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    client.delete_metafield(9).await.unwrap();

    assert_eq!(
        *api.inner.deleted.lock().unwrap(),
        vec![format!("/admin/api/{API_VERSION}/metafields/9.json")]
    );
}

#[tokio::test]
async fn test_delete_missing_metafield_is_not_found() {
    let api = AdminApi::default();
    let client = client_for(&api).await;

    let err = client.delete_metafield(10).await.unwrap_err();

    assert!(matches!(err, ShopifyError::NotFound(_)));
}
