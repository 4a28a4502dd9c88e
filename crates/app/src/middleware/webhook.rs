//! Webhook signature verification.
//!
//! Shopify signs every webhook with a base64 HMAC-SHA256 of the raw request
//! body, keyed by the app's API secret. The body must be verified before it
//! is parsed, so [`VerifiedWebhook`] buffers it and checks the signature
//! itself.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::HeaderMap,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use stock_sync_core::{ShopDomain, ShopDomainError};
use thiserror::Error;

use crate::error::AppError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const HMAC_HEADER: &str = "x-shopify-hmac-sha256";
/// Header naming the shop the webhook is about.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";
/// Header naming the webhook topic.
pub const TOPIC_HEADER: &str = "x-shopify-topic";

/// Errors verifying an inbound webhook.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("missing webhook signature")]
    MissingSignature,

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("missing shop domain header")]
    MissingShopDomain,

    #[error("invalid shop domain: {0}")]
    InvalidShopDomain(#[from] ShopDomainError),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                Self::Unauthorized(err.to_string())
            }
            WebhookError::MissingShopDomain | WebhookError::InvalidShopDomain(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

/// Check `signature` (base64) against the HMAC-SHA256 of `body`.
///
/// # Errors
///
/// Returns `WebhookError::InvalidSignature` if the signature is not valid
/// base64 or does not match.
pub fn verify_webhook_signature(
    body: &[u8],
    signature: &str,
    secret: &str,
) -> Result<(), WebhookError> {
    let provided = STANDARD
        .decode(signature.trim())
        .map_err(|_| WebhookError::InvalidSignature)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| WebhookError::InvalidSignature)
}

/// A webhook whose body signature has been verified.
#[derive(Debug)]
pub struct VerifiedWebhook {
    /// Shop the webhook is about.
    pub shop: ShopDomain,
    /// Webhook topic, e.g. `app/uninstalled`.
    pub topic: Option<String>,
    /// Raw body.
    pub body: Bytes,
}

impl VerifiedWebhook {
    fn verify(headers: &HeaderMap, body: Bytes, secret: &str) -> Result<Self, WebhookError> {
        let signature = header_str(headers, HMAC_HEADER).ok_or(WebhookError::MissingSignature)?;
        verify_webhook_signature(&body, signature, secret)?;

        let shop = header_str(headers, SHOP_DOMAIN_HEADER).ok_or(WebhookError::MissingShopDomain)?;
        let shop = ShopDomain::parse(shop)?;

        Ok(Self {
            shop,
            topic: header_str(headers, TOPIC_HEADER).map(String::from),
            body,
        })
    }
}

impl FromRequest<AppState> for VerifiedWebhook {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let headers = req.headers().clone();
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        Self::verify(
            &headers,
            body,
            state.config().shopify.api_secret.expose_secret(),
        )
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook");
            AppError::from(e)
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    const SECRET: &str = "webhook-secret";

    fn sign(body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        STANDARD.encode(mac.finalize().into_bytes())
    }

    fn headers(signature: &str, shop: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HMAC_HEADER, HeaderValue::from_str(signature).unwrap());
        headers.insert(TOPIC_HEADER, HeaderValue::from_static("app/uninstalled"));
        if let Some(shop) = shop {
            headers.insert(SHOP_DOMAIN_HEADER, HeaderValue::from_static(shop));
        }
        headers
    }

    #[test]
    fn test_verify_signature() {
        let body = br#"{"id":1}"#;
        assert!(verify_webhook_signature(body, &sign(body), SECRET).is_ok());
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let signature = sign(br#"{"id":1}"#);
        assert_eq!(
            verify_webhook_signature(br#"{"id":2}"#, &signature, SECRET),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_non_base64_signature() {
        assert_eq!(
            verify_webhook_signature(b"{}", "not base64!", SECRET),
            Err(WebhookError::InvalidSignature)
        );
    }

    #[test]
    fn test_verified_webhook() {
        let body = Bytes::from_static(b"{}");
        let webhook = VerifiedWebhook::verify(
            &headers(&sign(&body), Some("a.myshopify.com")),
            body,
            SECRET,
        )
        .unwrap();
        assert_eq!(webhook.shop.as_str(), "a.myshopify.com");
        assert_eq!(webhook.topic.as_deref(), Some("app/uninstalled"));
    }

    #[test]
    fn test_signature_checked_before_shop() {
        let body = Bytes::from_static(b"{}");
        let err = VerifiedWebhook::verify(&headers("AAAA", None), body, SECRET).unwrap_err();
        assert_eq!(err, WebhookError::InvalidSignature);
    }

    #[test]
    fn test_missing_shop_domain() {
        let body = Bytes::from_static(b"{}");
        let err = VerifiedWebhook::verify(&headers(&sign(&body), None), body, SECRET).unwrap_err();
        assert_eq!(err, WebhookError::MissingShopDomain);
        assert!(matches!(AppError::from(err), AppError::Validation(_)));
    }

    #[test]
    fn test_missing_signature_maps_to_unauthorized() {
        assert!(matches!(
            AppError::from(WebhookError::MissingSignature),
            AppError::Unauthorized(_)
        ));
    }
}
