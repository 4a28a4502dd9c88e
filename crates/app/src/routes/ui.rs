//! Embedded UI entry point and static build serving.

use std::path::Path;

use axum::{
    extract::{RawQuery, Request, State},
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};

use crate::error::AppError;
use crate::state::AppState;

/// Serve the UI build directory, falling back to `index.html` for
/// client-side routes.
pub fn static_files(dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html")))
}

/// GET /app - Embedded app entry point.
///
/// Shopify opens the app with a signed query string; the signature is
/// checked before the UI shell is served.
pub async fn embedded_entry(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    request: Request,
) -> Result<Response, AppError> {
    let query = query.unwrap_or_default();
    if !state.oauth().verify_query(&query) {
        tracing::warn!("Rejected unsigned embedded app request");
        return Err(AppError::Forbidden(
            "request signature is missing or invalid".to_string(),
        ));
    }

    let index = state.config().static_dir.join("index.html");
    let response = match ServeFile::new(index).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    Ok(response)
}
