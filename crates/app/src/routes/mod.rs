//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                - Liveness
//! GET  /health/ready                          - Readiness (store directory reachable)
//!
//! # Install (OAuth)
//! GET  /auth                                  - Start install, redirect to Shopify
//! GET  /auth/callback                         - Finish install
//!
//! # Webhooks (HMAC-verified)
//! POST /webhooks/app/uninstalled              - Forget the store
//! POST /webhooks/compliance_webhooks          - Privacy topics (shop/redact forgets the store)
//!
//! # API (session token or dev shop header)
//! POST /api/products/{id}/sync-master         - Designate a sync master
//! GET  /api/products/{id}/linked-products     - Read a master's linkage
//! PUT  /api/products/{id}/linked-products     - Replace a master's children
//! POST /api/products/{id}/sync-inventory      - Propagate a quantity to children
//! POST /api/products/graphql                  - Admin GraphQL proxy
//! POST /api/metafields/check-and-create       - Ensure metafield definitions
//!
//! # Embedded UI
//! GET  /app                                   - Signed entry point (index.html)
//! *                                           - Static build, falls back to index.html
//! ```

pub mod auth;
pub mod health;
pub mod metafields;
pub mod products;
pub mod ui;
pub mod webhooks;

use axum::{
    Router,
    extract::FromRequest,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

/// JSON extractor and response that reports rejections as [`AppError`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Create the install routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(auth::install))
        .route("/callback", get(auth::callback))
}

/// Create the webhook routes router.
pub fn webhook_routes() -> Router<AppState> {
    Router::new()
        .route("/app/uninstalled", post(webhooks::app_uninstalled))
        .route("/compliance_webhooks", post(webhooks::compliance))
}

/// Create the API routes router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/products/graphql", post(products::graphql_proxy))
        .route("/products/{id}/sync-master", post(products::designate_master))
        .route(
            "/products/{id}/linked-products",
            get(products::read_linkage).put(products::link_children),
        )
        .route("/products/{id}/sync-inventory", post(products::sync_inventory))
        .route(
            "/metafields/check-and-create",
            post(metafields::check_and_create),
        )
}

/// Create all routes for the app, with the static UI as fallback.
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/api", api_routes())
        .route("/app", get(ui::embedded_entry))
        .fallback_service(ui::static_files(&state.config().static_dir))
}
