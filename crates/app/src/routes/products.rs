//! Product linkage API.

use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use stock_sync_core::{InventoryQuantity, ProductId, ProductLinkage, SyncReport, SyncStatus};
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::CurrentStore;
use crate::services::SyncEngine;

use super::ApiJson;

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `PUT /api/products/{id}/linked-products`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LinkProductsRequest {
    pub child_product_ids: Vec<ProductId>,
}

/// Body of `POST /api/products/{id}/sync-inventory`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SyncInventoryRequest {
    pub inventory_quantity: InventoryQuantity,
}

/// Body of `POST /api/products/graphql`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GraphQLProxyRequest {
    pub query: String,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
}

/// Response of `POST /api/products/{id}/sync-master`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignationResponse {
    pub product_id: ProductId,
    pub is_sync_master: bool,
    /// Whether this call wrote the flag (false when already a master).
    pub updated: bool,
}

/// Response of `POST /api/products/{id}/sync-inventory`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInventoryResponse {
    pub status: SyncStatus,
    pub updated_count: usize,
    pub failed_count: usize,
    #[serde(flatten)]
    pub report: SyncReport,
}

impl IntoResponse for SyncInventoryResponse {
    fn into_response(self) -> Response {
        let status = match self.status {
            SyncStatus::Complete => StatusCode::OK,
            SyncStatus::Partial | SyncStatus::Failed => StatusCode::MULTI_STATUS,
        };
        (status, ApiJson(self)).into_response()
    }
}

impl From<SyncReport> for SyncInventoryResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            status: report.status(),
            updated_count: report.updated_count(),
            failed_count: report.failed_count(),
            report,
        }
    }
}

fn parse_product_id(raw: &str) -> Result<ProductId, AppError> {
    ProductId::parse(raw).map_err(|e| AppError::Validation(e.to_string()))
}

// =============================================================================
// Route Handlers
// =============================================================================

/// POST /api/products/{id}/sync-master - Designate a sync master.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn designate_master(
    CurrentStore(store): CurrentStore,
    Path(id): Path<String>,
) -> Result<ApiJson<DesignationResponse>, AppError> {
    let product = parse_product_id(&id)?;
    let designation = SyncEngine::for_session(&store)
        .designate_master(&product)
        .await?;

    Ok(ApiJson(DesignationResponse {
        product_id: product,
        is_sync_master: true,
        updated: designation.wrote(),
    }))
}

/// GET /api/products/{id}/linked-products - Read a master's linkage.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn read_linkage(
    CurrentStore(store): CurrentStore,
    Path(id): Path<String>,
) -> Result<ApiJson<ProductLinkage>, AppError> {
    let master = parse_product_id(&id)?;
    let linkage = SyncEngine::for_session(&store).linkage(&master).await?;
    Ok(ApiJson(linkage))
}

/// PUT /api/products/{id}/linked-products - Replace a master's children.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn link_children(
    CurrentStore(store): CurrentStore,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<LinkProductsRequest>,
) -> Result<ApiJson<ProductLinkage>, AppError> {
    let master = parse_product_id(&id)?;
    let linkage = SyncEngine::for_session(&store)
        .link_children(&master, body.child_product_ids)
        .await?;
    Ok(ApiJson(linkage))
}

/// POST /api/products/{id}/sync-inventory - Propagate a quantity.
///
/// Responds 200 when every child was updated and 207 with the per-child
/// report otherwise.
#[instrument(skip_all, fields(product_id = %id))]
pub async fn sync_inventory(
    CurrentStore(store): CurrentStore,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<SyncInventoryRequest>,
) -> Result<SyncInventoryResponse, AppError> {
    let master = parse_product_id(&id)?;
    let report = SyncEngine::for_session(&store)
        .sync_inventory(&master, body.inventory_quantity)
        .await?;
    Ok(SyncInventoryResponse::from(report))
}

/// POST /api/products/graphql - Forward a GraphQL document to the store.
#[instrument(skip_all)]
pub async fn graphql_proxy(
    CurrentStore(store): CurrentStore,
    ApiJson(body): ApiJson<GraphQLProxyRequest>,
) -> Result<ApiJson<serde_json::Value>, AppError> {
    if body.query.trim().is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }

    let response = store.platform().graphql(&body.query, body.variables).await?;
    Ok(ApiJson(response))
}
