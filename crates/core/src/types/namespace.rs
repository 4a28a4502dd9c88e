//! Per-store metafield namespace and the linkage metafields stored in it.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::shop::ShopId;

/// Prefix for every store namespace.
const NAMESPACE_PREFIX: &str = "stock_sync_";

/// Metafield namespace scoping one store's linkage data.
///
/// Derived deterministically from the shop id, so the same store always
/// resolves to the same metafield bucket.
///
/// ```
/// use stock_sync_core::{Namespace, ShopId};
///
/// let ns = Namespace::for_shop(ShopId::new(548_380_009));
/// assert_eq!(ns.as_str(), "stock_sync_548380009");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
    /// Derive the namespace for a shop.
    #[must_use]
    pub fn for_shop(shop_id: ShopId) -> Self {
        Self(format!("{NAMESPACE_PREFIX}{}", shop_id.as_u64()))
    }

    /// Returns the namespace as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Namespace {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The product metafields that together hold a linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageField {
    /// Boolean marker on a master product.
    IsSyncMaster,
    /// Ordered list of child product references on a master product.
    LinkedProducts,
    /// Back-reference from a child to its master.
    LinkedMaster,
    /// JSON bookkeeping on a master (version, timestamps, last quantity).
    SyncState,
}

impl LinkageField {
    /// Every linkage field, in the order their definitions are created.
    pub const ALL: [Self; 4] = [
        Self::IsSyncMaster,
        Self::LinkedProducts,
        Self::LinkedMaster,
        Self::SyncState,
    ];

    /// Metafield key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::IsSyncMaster => "is_sync_master",
            Self::LinkedProducts => "linked_products",
            Self::LinkedMaster => "linked_master",
            Self::SyncState => "sync_state",
        }
    }

    /// Metafield type name, as used by both REST values and definitions.
    #[must_use]
    pub const fn metafield_type(self) -> &'static str {
        match self {
            Self::IsSyncMaster => "boolean",
            Self::LinkedProducts => "list.product_reference",
            Self::LinkedMaster => "product_reference",
            Self::SyncState => "json",
        }
    }

    /// Human-readable definition name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::IsSyncMaster => "Stock Sync Master",
            Self::LinkedProducts => "Linked Products",
            Self::LinkedMaster => "Linked Master",
            Self::SyncState => "Stock Sync State",
        }
    }

    /// Definition description shown in the Shopify admin.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::IsSyncMaster => {
                "Marks this product as the sync master controlling inventory of its linked products"
            }
            Self::LinkedProducts => {
                "Products whose inventory is synchronized from this sync master"
            }
            Self::LinkedMaster => "The sync master this product receives inventory from",
            Self::SyncState => "Linkage version and last synchronization details",
        }
    }

    /// Look up a field by metafield key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for LinkageField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
