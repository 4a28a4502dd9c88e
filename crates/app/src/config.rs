//! App configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `APP_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `APP_BASE_URL` - Public URL of the app, used to build the OAuth redirect
//! - `SHOPIFY_API_KEY` - Shopify app client ID
//! - `SHOPIFY_API_SECRET` - Shopify app client secret (signs OAuth, webhooks and session tokens)
//! - `SHOPIFY_APP_HANDLE` - App handle used for the post-install admin redirect
//!
//! ## Optional
//! - `APP_HOST` - Bind address (default: 127.0.0.1)
//! - `APP_PORT` - Listen port (default: 5000)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2025-01)
//! - `SHOPIFY_SCOPES` - Comma-separated OAuth scopes
//! - `STATIC_DIR` - Frontend build directory (default: frontend/build)
//! - `ALLOW_SHOP_HEADER` - Accept `X-Shop-Domain` instead of a session token (default: false)
//! - `STORE_CACHE_CAPACITY` - Maximum cached store sessions (default: 1000)
//! - `STORE_CACHE_IDLE_SECS` - Idle eviction for cached store sessions (default: 1800)
//! - `SCHEMA_RETRY_ATTEMPTS` - Retries for rate-limited definition calls (default: 3)
//! - `SCHEMA_RETRY_DELAY_MS` - Fixed delay between those retries (default: 2000)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
/// Admin API version used when `SHOPIFY_API_VERSION` is unset.
pub const DEFAULT_API_VERSION: &str = "2025-01";
const DEFAULT_SCOPES: &str =
    "read_products,write_products,read_inventory,write_inventory,read_locations";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// App configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the app
    pub base_url: String,
    /// Directory holding the built frontend
    pub static_dir: PathBuf,
    /// Whether `X-Shop-Domain` / `?shop=` may stand in for a session token
    pub allow_shop_header: bool,
    /// Shopify app credentials and API settings
    pub shopify: ShopifyAppConfig,
    /// Store session cache sizing
    pub store_cache: StoreCacheConfig,
    /// Retry policy for metafield definition calls
    pub schema_retry: RetryConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Shopify app configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct ShopifyAppConfig {
    /// App client ID (also the `aud` of App Bridge session tokens)
    pub api_key: String,
    /// App client secret
    pub api_secret: SecretString,
    /// App handle, as in `https://{shop}/admin/apps/{handle}`
    pub app_handle: String,
    /// Admin API version (e.g., 2025-01)
    pub api_version: String,
    /// OAuth scopes requested on install
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ShopifyAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyAppConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("app_handle", &self.app_handle)
            .field("api_version", &self.api_version)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Store session cache settings.
#[derive(Debug, Clone, Copy)]
pub struct StoreCacheConfig {
    /// Maximum number of cached stores
    pub capacity: u64,
    /// Evict a store after this long without a request
    pub time_to_idle: Duration,
}

/// Fixed-delay retry settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(2000),
        }
    }
}

impl RetryConfig {
    /// Load `SCHEMA_RETRY_ATTEMPTS` and `SCHEMA_RETRY_DELAY_MS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if either value is not a number.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(
            get_optional_env("SCHEMA_RETRY_ATTEMPTS").as_deref(),
            get_optional_env("SCHEMA_RETRY_DELAY_MS").as_deref(),
        )
    }

    fn from_values(attempts: Option<&str>, delay_ms: Option<&str>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let attempts = match attempts {
            Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidEnvVar("SCHEMA_RETRY_ATTEMPTS".to_string(), e.to_string())
            })?,
            None => defaults.attempts,
        };
        let delay = match delay_ms {
            Some(raw) => Duration::from_millis(raw.trim().parse().map_err(
                |e: std::num::ParseIntError| {
                    ConfigError::InvalidEnvVar("SCHEMA_RETRY_DELAY_MS".to_string(), e.to_string())
                },
            )?),
            None => defaults.delay,
        };
        Ok(Self { attempts, delay })
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("APP_DATABASE_URL")?;
        let host = parse_env("APP_HOST", "127.0.0.1")?;
        let port = parse_env("APP_PORT", "5000")?;
        let base_url = get_required_env("APP_BASE_URL")?
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidEnvVar("APP_BASE_URL".to_string(), e.to_string()))?;

        let static_dir = PathBuf::from(get_env_or_default("STATIC_DIR", "frontend/build"));
        let allow_shop_header = parse_bool_env("ALLOW_SHOP_HEADER")?;
        let shopify = ShopifyAppConfig::from_env()?;

        let store_cache = StoreCacheConfig {
            capacity: parse_env("STORE_CACHE_CAPACITY", "1000")?,
            time_to_idle: Duration::from_secs(parse_env("STORE_CACHE_IDLE_SECS", "1800")?),
        };
        let schema_retry = RetryConfig::from_env()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            static_dir,
            allow_shop_header,
            shopify,
            store_cache,
            schema_retry,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// URL Shopify redirects to after the merchant approves the install.
    #[must_use]
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/auth/callback", self.base_url)
    }
}

impl ShopifyAppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let scopes = parse_scopes(&get_env_or_default("SHOPIFY_SCOPES", DEFAULT_SCOPES));
        if scopes.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPIFY_SCOPES".to_string(),
                "at least one scope is required".to_string(),
            ));
        }

        Ok(Self {
            api_key: get_required_env("SHOPIFY_API_KEY")?,
            api_secret: get_validated_secret("SHOPIFY_API_SECRET")?,
            app_handle: get_required_env("SHOPIFY_APP_HANDLE")?,
            api_version: get_env_or_default("SHOPIFY_API_VERSION", DEFAULT_API_VERSION),
            scopes,
        })
    }

    /// Scopes joined the way the OAuth authorize endpoint expects them.
    #[must_use]
    pub fn scope_param(&self) -> String {
        self.scopes.join(",")
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a boolean flag. Unset means `false`.
fn parse_bool_env(key: &str) -> Result<bool, ConfigError> {
    match get_optional_env(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some(value) => parse_bool(value)
            .ok_or_else(|| ConfigError::InvalidEnvVar(key.to_string(), value.to_string())),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the secret from the Partner Dashboard."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn shopify_config() -> ShopifyAppConfig {
        ShopifyAppConfig {
            api_key: "test_api_key".to_string(),
            api_secret: SecretString::from("shpss_9f2c41d07be84a5c"),
            app_handle: "stock-sync".to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            scopes: parse_scopes(DEFAULT_SCOPES),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-api-secret-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let err = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("shpss_9f2c41d07be84a5c3e6d", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_scopes() {
        assert_eq!(
            parse_scopes(" read_products, ,write_inventory "),
            vec!["read_products", "write_inventory"]
        );
        assert_eq!(shopify_config().scope_param(), DEFAULT_SCOPES);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn test_retry_defaults() {
        let retry = RetryConfig::default();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay, Duration::from_millis(2000));
    }

    #[test]
    fn test_retry_from_values() {
        let retry = RetryConfig::from_values(Some("5"), Some(" 250 ")).unwrap();
        assert_eq!(retry.attempts, 5);
        assert_eq!(retry.delay, Duration::from_millis(250));

        let retry = RetryConfig::from_values(None, Some("10")).unwrap();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay, Duration::from_millis(10));

        let err = RetryConfig::from_values(Some("many"), None).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SCHEMA_RETRY_ATTEMPTS")
        );
        let err = RetryConfig::from_values(None, Some("-1")).unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "SCHEMA_RETRY_DELAY_MS")
        );
    }

    #[test]
    fn test_socket_addr_and_redirect() {
        let config = AppConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 5000,
            base_url: "https://sync.example.dev".to_string(),
            static_dir: PathBuf::from("frontend/build"),
            allow_shop_header: false,
            shopify: shopify_config(),
            store_cache: StoreCacheConfig {
                capacity: 10,
                time_to_idle: Duration::from_secs(60),
            },
            schema_retry: RetryConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.port(), 5000);
        assert_eq!(
            config.oauth_redirect_uri(),
            "https://sync.example.dev/auth/callback"
        );
    }

    #[test]
    fn test_shopify_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", shopify_config());

        assert!(debug_output.contains("test_api_key"));
        assert!(debug_output.contains("stock-sync"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpss_9f2c41d07be84a5c"));
    }
}
