//! Metafield definition API.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::CurrentStore;
use crate::services::{SchemaReport, SyncEngine};
use crate::state::AppState;

use super::ApiJson;

/// Response of `POST /api/metafields/check-and-create`, listing keys.
#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub namespace: String,
    pub created: Vec<&'static str>,
    pub existing: Vec<&'static str>,
}

impl SchemaResponse {
    fn new(namespace: String, report: &SchemaReport) -> Self {
        Self {
            namespace,
            created: report.created.iter().map(|f| f.key()).collect(),
            existing: report.existing.iter().map(|f| f.key()).collect(),
        }
    }
}

/// POST /api/metafields/check-and-create - Ensure the linkage definitions.
#[instrument(skip_all)]
pub async fn check_and_create(
    State(state): State<AppState>,
    CurrentStore(store): CurrentStore,
) -> Result<ApiJson<SchemaResponse>, AppError> {
    let report = SyncEngine::for_session(&store)
        .with_retry(state.schema_retry())
        .ensure_schema()
        .await?;

    Ok(ApiJson(SchemaResponse::new(
        store.namespace().to_string(),
        &report,
    )))
}
