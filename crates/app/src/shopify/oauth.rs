//! OAuth install flow and signed-query verification.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use stock_sync_core::ShopDomain;
use tracing::instrument;

use crate::config::ShopifyAppConfig;

use super::ShopifyError;

type HmacSha256 = Hmac<Sha256>;

/// An access token obtained from the code exchange.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct AccessToken {
    /// Offline access token for Admin API calls.
    pub access_token: SecretString,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// OAuth token response from Shopify.
#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    #[serde(default)]
    scope: String,
}

/// Shopify app OAuth client.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: SecretString,
    scopes: String,
    redirect_uri: String,
}

impl OAuthClient {
    /// Create a client from the app credentials.
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ShopifyAppConfig, redirect_uri: String) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            scopes: config.scope_param(),
            redirect_uri,
        }
    }

    /// The authorize URL to send the merchant to.
    #[must_use]
    pub fn authorization_url(&self, shop: &ShopDomain, state: &str) -> String {
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop,
            urlencoding::encode(&self.api_key),
            urlencoding::encode(&self.scopes),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Whether a signed query string came from Shopify.
    #[must_use]
    pub fn verify_query(&self, raw_query: &str) -> bool {
        verify_query_hmac(raw_query, self.api_secret.expose_secret())
    }

    /// Exchange an authorization code for an offline access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if the exchange is rejected and
    /// `ShopifyError::Http` if the request fails.
    #[instrument(skip(self, code), fields(shop = %shop))]
    pub async fn exchange_code(
        &self,
        shop: &ShopDomain,
        code: &str,
    ) -> Result<AccessToken, ShopifyError> {
        let url = format!("https://{shop}/admin/oauth/access_token");

        let params = [
            ("client_id", self.api_key.as_str()),
            ("client_secret", self.api_secret.expose_secret()),
            ("code", code),
        ];

        let response = self.http.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed ({status}): {text}"
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await?;

        Ok(AccessToken {
            access_token: SecretString::from(token_response.access_token),
            scopes: token_response
                .scope
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect(),
        })
    }
}

/// Verify the `hmac` parameter of a Shopify-signed query string.
///
/// The message is every other parameter (minus `signature`), sorted by key
/// and joined as `key=value` pairs with `&`. The digest is hex-encoded and
/// compared in constant time.
#[must_use]
pub fn verify_query_hmac(raw_query: &str, secret: &str) -> bool {
    let mut provided_hmac = None;
    let mut param_pairs: Vec<(String, String)> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        match key.as_ref() {
            "hmac" => provided_hmac = Some(value.into_owned()),
            "signature" => {}
            _ => param_pairs.push((key.into_owned(), value.into_owned())),
        }
    }

    let Some(provided_hmac) = provided_hmac else {
        return false;
    };
    let Ok(provided) = hex::decode(provided_hmac) else {
        return false;
    };

    param_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let message: String = param_pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());

    mac.verify_slice(&provided).is_ok()
}
