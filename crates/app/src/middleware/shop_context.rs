//! Shop context extractors for the `/api` routes.
//!
//! A request names its shop through an App Bridge session token. In
//! development (`ALLOW_SHOP_HEADER=true`) a bare `X-Shop-Domain` header or
//! `?shop=` query parameter is accepted instead.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use secrecy::ExposeSecret;
use stock_sync_core::ShopDomain;
use tracing::Span;

use crate::error::{AppError, set_sentry_context};
use crate::services::StoreSession;
use crate::state::AppState;

use super::session_token::verify_session_token;

/// Header naming the shop when session tokens are not required.
pub const SHOP_DOMAIN_HEADER: &str = "x-shop-domain";

/// The shop a request acts for.
#[derive(Debug, Clone)]
pub struct ShopContext {
    /// Shop domain.
    pub shop: ShopDomain,
    /// Staff user id from the session token, if any.
    pub user_id: Option<String>,
}

impl FromRequestParts<AppState> for ShopContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let shopify = &state.config().shopify;

        if let Some(token) = bearer_token(&parts.headers) {
            let verified = verify_session_token(
                token,
                &shopify.api_key,
                shopify.api_secret.expose_secret(),
                chrono::Utc::now().timestamp(),
            )
            .map_err(|e| {
                tracing::warn!(error = %e, "Rejected session token");
                AppError::Unauthorized(e.to_string())
            })?;

            return Ok(Self {
                shop: verified.shop,
                user_id: verified.user_id,
            });
        }

        if !state.config().allow_shop_header {
            return Err(AppError::Unauthorized("missing session token".to_string()));
        }

        let raw = parts
            .headers
            .get(SHOP_DOMAIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .or_else(|| parts.uri.query().and_then(shop_from_query))
            .ok_or_else(|| AppError::Validation("shop domain is required".to_string()))?;

        let shop = ShopDomain::parse(&raw).map_err(|e| AppError::Validation(e.to_string()))?;

        Ok(Self {
            shop,
            user_id: None,
        })
    }
}

/// The resolved store session for the request's shop.
///
/// Rejects with 401 when the shop has not installed the app.
pub struct CurrentStore(pub Arc<StoreSession>);

impl FromRequestParts<AppState> for CurrentStore {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let context = ShopContext::from_request_parts(parts, state).await?;

        let span = Span::current();
        span.record("shop", context.shop.as_str());
        if let Some(user_id) = &context.user_id {
            span.record("user_id", user_id.as_str());
        }
        set_sentry_context(context.shop.as_str(), context.user_id.as_deref());

        let session = state.stores().resolve(&context.shop).await?;
        Ok(Self(session))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn shop_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "shop")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer a.b.c"));
        assert_eq!(bearer_token(&headers), Some("a.b.c"));
    }

    #[test]
    fn test_shop_from_query() {
        assert_eq!(
            shop_from_query("host=x&shop=a.myshopify.com").as_deref(),
            Some("a.myshopify.com")
        );
        assert_eq!(shop_from_query("host=x"), None);
    }
}
