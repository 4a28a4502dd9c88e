//! Shopify Admin API integration.
//!
//! # Architecture
//!
//! - [`ShopifyClient`]: one store's authenticated Admin API client. REST for
//!   product metafields, variants, locations and inventory levels; GraphQL
//!   (hand-written `graphql_client::GraphQLQuery` impls) for metafield
//!   upserts, metafield definitions and the shop identity.
//! - [`CommercePlatform`]: the seam the sync engine talks to. `ShopifyClient`
//!   implements it; tests substitute a recording fake.
//! - [`OAuthClient`]: install flow (authorize URL, code exchange, signed query
//!   verification).
//! - [`RetryPolicy`]: fixed-delay retry on rate limiting, used for metafield
//!   definition calls.

mod client;
mod oauth;
mod platform;
pub mod queries;
mod retry;
pub mod types;

pub use client::ShopifyClient;
pub use oauth::{AccessToken, OAuthClient, verify_query_hmac};
pub use platform::{CommercePlatform, DefinitionOutcome, PlatformConnector, ShopifyConnector};
pub use retry::RetryPolicy;
pub use types::{Metafield, MetafieldDefinition};

use thiserror::Error;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User error from mutation (e.g., invalid input).
    #[error("User error: {0}")]
    UserError(String),

    /// OAuth code exchange failed.
    #[error("OAuth error: {0}")]
    OAuth(String),
}

impl ShopifyError {
    /// Whether the call was rejected for rate limiting.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}
