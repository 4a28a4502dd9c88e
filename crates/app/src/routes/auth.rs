//! Shopify app install (OAuth) routes.
//!
//! `/auth` stores a random CSRF state in the session and sends the merchant
//! to Shopify's consent screen. `/auth/callback` checks the signed query and
//! the state, exchanges the code for an offline token, records the store and
//! makes sure its metafield definitions exist.

use axum::{
    extract::{Query, RawQuery, State},
    response::Redirect,
};
use serde::Deserialize;
use stock_sync_core::ShopDomain;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::NewStore;
use crate::error::AppError;
use crate::services::{StoreSession, SyncEngine};
use crate::state::AppState;

const OAUTH_STATE_KEY: &str = "shopify_oauth_state";

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct InstallParams {
    pub shop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub shop: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn parse_shop(raw: Option<&str>) -> Result<ShopDomain, AppError> {
    let raw = raw.ok_or_else(|| AppError::Validation("shop is required".to_string()))?;
    ShopDomain::parse(raw).map_err(|e| AppError::Validation(e.to_string()))
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /auth - Start the install flow.
#[instrument(skip_all)]
pub async fn install(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<InstallParams>,
) -> Result<Redirect, AppError> {
    let shop = parse_shop(params.shop.as_deref())?;

    let oauth_state = uuid::Uuid::new_v4().to_string();
    session
        .insert(OAUTH_STATE_KEY, &oauth_state)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store OAuth state: {e}")))?;

    let auth_url = state.oauth().authorization_url(&shop, &oauth_state);

    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Ok(Redirect::to(&auth_url))
}

/// GET /auth/callback - Finish the install flow.
#[instrument(skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    RawQuery(raw_query): RawQuery,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, AppError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        tracing::warn!(error = %error, description, "Shopify OAuth error");
        return Err(AppError::Forbidden(format!("authorization denied: {error}")));
    }

    if !state.oauth().verify_query(raw_query.as_deref().unwrap_or_default()) {
        tracing::warn!("Invalid HMAC signature in OAuth callback");
        return Err(AppError::Forbidden("invalid callback signature".to_string()));
    }

    let shop = parse_shop(params.shop.as_deref())?;
    let (Some(code), Some(callback_state)) = (&params.code, &params.state) else {
        return Err(AppError::Validation("code and state are required".to_string()));
    };

    let stored_state: Option<String> = session.get(OAUTH_STATE_KEY).await.ok().flatten();
    if stored_state.as_ref() != Some(callback_state) {
        tracing::warn!(shop = %shop, "OAuth state mismatch");
        return Err(AppError::Forbidden("OAuth state mismatch".to_string()));
    }
    if let Err(e) = session.remove::<String>(OAUTH_STATE_KEY).await {
        tracing::warn!(error = %e, "Failed to clear OAuth state");
    }

    let token = state.oauth().exchange_code(&shop, code).await?;

    let platform = state
        .stores()
        .connector()
        .connect(&shop, &token.access_token);
    let shop_id = platform.shop_id().await?;

    let record = state
        .directory()
        .upsert(&NewStore {
            shop_id,
            shop_domain: shop.clone(),
            access_token: token.access_token,
            scopes: token.scopes,
        })
        .await?;
    state.stores().invalidate(&shop).await;

    tracing::info!(shop = %shop, shop_id = %shop_id, "Store installed");

    let store = StoreSession::new(&record, platform);
    match SyncEngine::for_session(&store)
        .with_retry(state.schema_retry())
        .ensure_schema()
        .await
    {
        Ok(report) => tracing::info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "Metafield schema ensured"
        ),
        Err(e) => tracing::warn!(error = %e, "Failed to ensure metafield schema after install"),
    }

    let app_url = format!(
        "https://{shop}/admin/apps/{}",
        state.config().shopify.app_handle
    );
    Ok(Redirect::to(&app_url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shop() {
        assert!(matches!(parse_shop(None), Err(AppError::Validation(_))));
        assert!(matches!(
            parse_shop(Some("evil.com")),
            Err(AppError::Validation(_))
        ));
        assert_eq!(
            parse_shop(Some("A.myshopify.com")).unwrap().as_str(),
            "a.myshopify.com"
        );
    }
}
