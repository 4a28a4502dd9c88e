//! Session middleware configuration.
//!
//! Sessions only carry the OAuth CSRF state between `/auth` and
//! `/auth/callback`, so they are short-lived. `SameSite=Lax` is required:
//! the callback arrives as a top-level redirect from Shopify.

use sqlx::PgPool;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::AppConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "stock_sync_session";

/// Session expiry after inactivity (10 minutes covers the install round trip).
const SESSION_EXPIRY_SECONDS: i64 = 10 * 60;

/// Create the session layer with the `PostgreSQL` store.
///
/// The session table is created by migration in the `stock_sync` schema.
///
/// # Errors
///
/// Returns the store's message if the schema or table name is rejected.
pub fn create_session_layer(
    pool: &PgPool,
    config: &AppConfig,
) -> Result<SessionManagerLayer<PostgresStore>, String> {
    let store = PostgresStore::new(pool.clone())
        .with_schema_name("stock_sync")?
        .with_table_name("session")?;

    let is_secure = config.base_url.starts_with("https://");

    Ok(SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/"))
}
