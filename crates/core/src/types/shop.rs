//! Shop identity types.
//!
//! A shop is addressed two ways: by its `*.myshopify.com` domain (what
//! requests, webhooks and OAuth callbacks carry) and by its numeric id
//! (platform-assigned and immutable, used for namespacing).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Suffix every Shopify shop domain must carry.
const MYSHOPIFY_SUFFIX: &str = ".myshopify.com";

/// Prefix of a Shopify shop global ID.
const SHOP_GID_PREFIX: &str = "gid://shopify/Shop/";

/// Errors that can occur when parsing a [`ShopDomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopDomainError {
    /// The input string is empty.
    #[error("shop domain cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("shop domain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The domain is not a `myshopify.com` domain.
    #[error("shop domain must end with .myshopify.com")]
    NotMyshopify,
    /// The shop handle contains characters outside `[a-z0-9-]`.
    #[error("shop domain contains invalid characters")]
    InvalidCharacters,
}

/// A validated `*.myshopify.com` shop domain.
///
/// The domain ends up in outbound URLs, so anything that is not a plain
/// shop handle is rejected.
///
/// ## Examples
///
/// ```
/// use stock_sync_core::ShopDomain;
///
/// assert!(ShopDomain::parse("a.myshopify.com").is_ok());
/// assert!(ShopDomain::parse("My-Store.myshopify.com").is_ok());
///
/// assert!(ShopDomain::parse("").is_err());
/// assert!(ShopDomain::parse("evil.com").is_err());
/// assert!(ShopDomain::parse("a.b.myshopify.com").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct ShopDomain(String);

impl ShopDomain {
    /// Maximum length of a shop domain.
    pub const MAX_LENGTH: usize = 255;

    /// Parse a `ShopDomain`, normalizing to lowercase.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, too long, not a
    /// `myshopify.com` domain, or the shop handle has invalid characters.
    pub fn parse(s: &str) -> Result<Self, ShopDomainError> {
        let s = s.trim().to_ascii_lowercase();

        if s.is_empty() {
            return Err(ShopDomainError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(ShopDomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        let handle = s
            .strip_suffix(MYSHOPIFY_SUFFIX)
            .ok_or(ShopDomainError::NotMyshopify)?;

        if handle.is_empty() || handle.starts_with('-') {
            return Err(ShopDomainError::InvalidCharacters);
        }

        if !handle
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ShopDomainError::InvalidCharacters);
        }

        Ok(Self(s))
    }

    /// Returns the domain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the shop handle (the part before `.myshopify.com`).
    #[must_use]
    pub fn handle(&self) -> &str {
        self.0.strip_suffix(MYSHOPIFY_SUFFIX).unwrap_or(&self.0)
    }

    /// Consumes the `ShopDomain` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ShopDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ShopDomain {
    type Err = ShopDomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ShopDomain {
    type Error = ShopDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShopDomain> for String {
    fn from(domain: ShopDomain) -> Self {
        domain.0
    }
}

impl AsRef<str> for ShopDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Errors that can occur when parsing a [`ShopId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopIdError {
    /// The input is neither a number nor a `gid://shopify/Shop/<n>` ID.
    #[error("invalid shop id: {0}")]
    Invalid(String),
}

/// Platform-assigned, immutable shop identifier.
///
/// Accepts either the numeric id or the GraphQL global id.
///
/// ```
/// use stock_sync_core::ShopId;
///
/// let id = ShopId::parse("gid://shopify/Shop/548380009").unwrap();
/// assert_eq!(id.as_u64(), 548_380_009);
/// assert_eq!(id, ShopId::parse("548380009").unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShopId(u64);

impl ShopId {
    /// Create a shop id from its numeric value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Parse a numeric id or a `gid://shopify/Shop/<n>` global id.
    ///
    /// # Errors
    ///
    /// Returns `ShopIdError::Invalid` if no numeric id can be extracted.
    pub fn parse(s: &str) -> Result<Self, ShopIdError> {
        let trimmed = s.trim();
        let numeric = trimmed.strip_prefix(SHOP_GID_PREFIX).unwrap_or(trimmed);
        numeric
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ShopIdError::Invalid(s.to_string()))
    }

    /// Get the underlying numeric value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The GraphQL global id for this shop.
    #[must_use]
    pub fn gid(&self) -> String {
        format!("{SHOP_GID_PREFIX}{}", self.0)
    }
}

impl fmt::Display for ShopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ShopId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopDomain {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopDomain {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        // Database values are assumed valid
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopDomain {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ShopId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ShopId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(u64::try_from(id)?))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ShopId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        let id = i64::try_from(self.0)?;
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&id, buf)
    }
}
