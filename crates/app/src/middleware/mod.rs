//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (recorded on the span, echoed as `x-request-id`)
//! 4. Session layer (tower-sessions with `PostgreSQL` store, OAuth state only)
//!
//! # Extractors
//!
//! - [`ShopContext`] / [`CurrentStore`] - the shop an `/api` request acts for
//! - [`VerifiedWebhook`] - a webhook body with a verified signature

pub mod request_id;
pub mod session;
pub mod session_token;
pub mod shop_context;
pub mod webhook;

pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use session::create_session_layer;
pub use session_token::{SessionTokenError, VerifiedToken, verify_session_token};
pub use shop_context::{CurrentStore, SHOP_DOMAIN_HEADER, ShopContext};
pub use webhook::{VerifiedWebhook, WebhookError, verify_webhook_signature};
