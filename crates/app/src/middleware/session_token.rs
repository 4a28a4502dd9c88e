//! App Bridge session token verification.
//!
//! The embedded UI sends `Authorization: Bearer <jwt>` on every API call. The
//! token is an HS256 JWT signed with the app's API secret:
//!
//! - `aud` is the app's API key
//! - `dest` is the shop URL (`https://{shop}.myshopify.com`)
//! - `iss` is the shop's admin URL and must share the `dest` host
//! - `exp` / `nbf` bound its validity (checked with a small leeway)

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use stock_sync_core::ShopDomain;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Clock skew tolerated on `exp` and `nbf`, in seconds.
const LEEWAY_SECONDS: i64 = 5;

/// Errors verifying a session token.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionTokenError {
    #[error("session token is malformed")]
    Malformed,

    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("session token signature is invalid")]
    InvalidSignature,

    #[error("session token has expired")]
    Expired,

    #[error("session token is not yet valid")]
    NotYetValid,

    #[error("session token was issued for another app")]
    AudienceMismatch,

    #[error("session token destination is not a shop: {0}")]
    InvalidDestination(String),

    #[error("session token issuer does not match its destination")]
    IssuerMismatch,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    iss: String,
    dest: String,
    aud: String,
    exp: i64,
    nbf: i64,
    #[serde(default)]
    sub: Option<String>,
}

/// The verified identity carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Shop the token was issued for.
    pub shop: ShopDomain,
    /// Shopify user id of the staff member, when present.
    pub user_id: Option<String>,
}

/// Verify `token` for the app identified by `api_key` at unix time `now`.
///
/// # Errors
///
/// Returns a `SessionTokenError` naming the first check that failed.
pub fn verify_session_token(
    token: &str,
    api_key: &str,
    api_secret: &str,
    now: i64,
) -> Result<VerifiedToken, SessionTokenError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(SessionTokenError::Malformed);
    };

    let header: Header = decode_segment(header_b64)?;
    if header.alg != "HS256" {
        return Err(SessionTokenError::UnsupportedAlgorithm(header.alg));
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| SessionTokenError::Malformed)?;
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|_| SessionTokenError::InvalidSignature)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| SessionTokenError::InvalidSignature)?;

    let claims: Claims = decode_segment(claims_b64)?;

    if now > claims.exp.saturating_add(LEEWAY_SECONDS) {
        return Err(SessionTokenError::Expired);
    }
    if now.saturating_add(LEEWAY_SECONDS) < claims.nbf {
        return Err(SessionTokenError::NotYetValid);
    }
    if claims.aud != api_key {
        return Err(SessionTokenError::AudienceMismatch);
    }

    let dest_host = host_of(&claims.dest)
        .ok_or_else(|| SessionTokenError::InvalidDestination(claims.dest.clone()))?;
    let shop = ShopDomain::parse(&dest_host)
        .map_err(|_| SessionTokenError::InvalidDestination(claims.dest.clone()))?;

    if host_of(&claims.iss).as_deref() != Some(dest_host.as_str()) {
        return Err(SessionTokenError::IssuerMismatch);
    }

    Ok(VerifiedToken {
        shop,
        user_id: claims.sub,
    })
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str) -> Result<T, SessionTokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| SessionTokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| SessionTokenError::Malformed)
}

fn host_of(raw: &str) -> Option<String> {
    url::Url::parse(raw)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const KEY: &str = "api-key";
    const SECRET: &str = "session-secret";
    const NOW: i64 = 1_700_000_000;

    fn sign(header: &serde_json::Value, claims: &serde_json::Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(header.to_string());
        let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{header}.{claims}").as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{header}.{claims}.{signature}")
    }

    fn claims() -> serde_json::Value {
        json!({
            "iss": "https://a.myshopify.com/admin",
            "dest": "https://a.myshopify.com",
            "aud": KEY,
            "sub": "42",
            "exp": NOW + 60,
            "nbf": NOW - 60,
            "iat": NOW - 60,
            "jti": "abc",
        })
    }

    fn hs256() -> serde_json::Value {
        json!({"alg": "HS256", "typ": "JWT"})
    }

    #[test]
    fn test_valid_token() {
        let token = sign(&hs256(), &claims(), SECRET);
        let verified = verify_session_token(&token, KEY, SECRET, NOW).unwrap();
        assert_eq!(verified.shop.as_str(), "a.myshopify.com");
        assert_eq!(verified.user_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_wrong_secret() {
        let token = sign(&hs256(), &claims(), "other-secret");
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, NOW),
            Err(SessionTokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_tampered_claims() {
        let token = sign(&hs256(), &claims(), SECRET);
        let mut parts: Vec<&str> = token.split('.').collect();
        let mut forged = claims();
        forged["dest"] = json!("https://b.myshopify.com");
        let forged = URL_SAFE_NO_PAD.encode(forged.to_string());
        parts[1] = &forged;
        assert_eq!(
            verify_session_token(&parts.join("."), KEY, SECRET, NOW),
            Err(SessionTokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_expiry_and_not_before() {
        let token = sign(&hs256(), &claims(), SECRET);
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, NOW + 120),
            Err(SessionTokenError::Expired)
        );
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, NOW - 120),
            Err(SessionTokenError::NotYetValid)
        );
        assert!(verify_session_token(&token, KEY, SECRET, NOW + 63).is_ok());
    }

    #[test]
    fn test_extreme_time_claims() {
        let mut far_future = claims();
        far_future["exp"] = json!(i64::MAX);
        let token = sign(&hs256(), &far_future, SECRET);
        assert!(verify_session_token(&token, KEY, SECRET, NOW).is_ok());

        far_future["nbf"] = json!(i64::MAX);
        let token = sign(&hs256(), &far_future, SECRET);
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, i64::MAX - 10),
            Err(SessionTokenError::NotYetValid)
        );
    }

    #[test]
    fn test_audience_mismatch() {
        let token = sign(&hs256(), &claims(), SECRET);
        assert_eq!(
            verify_session_token(&token, "other-app", SECRET, NOW),
            Err(SessionTokenError::AudienceMismatch)
        );
    }

    #[test]
    fn test_issuer_must_match_destination() {
        let mut claims = claims();
        claims["iss"] = json!("https://b.myshopify.com/admin");
        let token = sign(&hs256(), &claims, SECRET);
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, NOW),
            Err(SessionTokenError::IssuerMismatch)
        );
    }

    #[test]
    fn test_destination_must_be_shop() {
        let mut claims = claims();
        claims["dest"] = json!("https://evil.example.com");
        claims["iss"] = json!("https://evil.example.com/admin");
        let token = sign(&hs256(), &claims, SECRET);
        assert!(matches!(
            verify_session_token(&token, KEY, SECRET, NOW),
            Err(SessionTokenError::InvalidDestination(_))
        ));
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let token = sign(&json!({"alg": "none"}), &claims(), SECRET);
        assert_eq!(
            verify_session_token(&token, KEY, SECRET, NOW),
            Err(SessionTokenError::UnsupportedAlgorithm("none".to_string()))
        );
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            verify_session_token("abc", KEY, SECRET, NOW),
            Err(SessionTokenError::Malformed)
        );
        assert_eq!(
            verify_session_token("a.b.c.d", KEY, SECRET, NOW),
            Err(SessionTokenError::Malformed)
        );
    }
}
