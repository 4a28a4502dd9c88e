//! Product identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Prefix of a Shopify product global ID.
const PRODUCT_GID_PREFIX: &str = "gid://shopify/Product/";

/// Errors that can occur when parsing a [`ProductId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProductIdError {
    /// The input string is empty.
    #[error("product id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("product id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The id contains characters outside `[A-Za-z0-9_-]`.
    #[error("product id contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// A product identifier within one shop.
///
/// Stored in its bare form (`123`); the GraphQL global id
/// (`gid://shopify/Product/123`) is accepted on input and produced by
/// [`ProductId::gid`] for product-reference metafields.
///
/// ```
/// use stock_sync_core::ProductId;
///
/// let id = ProductId::parse("gid://shopify/Product/632910392").unwrap();
/// assert_eq!(id.as_str(), "632910392");
/// assert_eq!(id.gid(), "gid://shopify/Product/632910392");
/// assert_eq!(id.numeric(), Some(632_910_392));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    /// Maximum length of a bare product id.
    pub const MAX_LENGTH: usize = 64;

    /// Parse a bare id or a product global id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is empty, too long, or contains characters
    /// that could not appear in a product id.
    pub fn parse(s: &str) -> Result<Self, ProductIdError> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix(PRODUCT_GID_PREFIX).unwrap_or(trimmed);

        if bare.is_empty() {
            return Err(ProductIdError::Empty);
        }

        if bare.len() > Self::MAX_LENGTH {
            return Err(ProductIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !bare
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ProductIdError::InvalidCharacters(s.to_string()));
        }

        Ok(Self(bare.to_string()))
    }

    /// Returns the bare id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The GraphQL global id, as stored in product-reference metafields.
    #[must_use]
    pub fn gid(&self) -> String {
        format!("{PRODUCT_GID_PREFIX}{}", self.0)
    }

    /// The numeric REST id, if the id is numeric.
    #[must_use]
    pub fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ProductId {
    type Err = ProductIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProductId {
    type Error = ProductIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProductId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
