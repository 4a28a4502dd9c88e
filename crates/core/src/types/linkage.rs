//! Master → children product linkage.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::product::ProductId;

/// Errors raised when a linkage would break its invariants.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkageError {
    /// A linkage request must name at least one child.
    #[error("at least one child product is required")]
    EmptyChildren,
    /// The master appears among its own children.
    #[error("product {0} cannot be linked to itself")]
    SelfLink(ProductId),
    /// The same child appears more than once.
    #[error("product {0} is listed more than once")]
    DuplicateChild(ProductId),
}

/// Bookkeeping stored next to a linkage.
///
/// `version` increases every time the child set is replaced; the quantity
/// fields record the most recent propagation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Incremented on every relink.
    #[serde(default)]
    pub version: u64,
    /// When the child set was last replaced.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Quantity sent by the most recent sync.
    #[serde(default)]
    pub last_quantity: Option<i64>,
    /// When the most recent sync finished.
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl SyncState {
    /// State after replacing the child set.
    #[must_use]
    pub fn relinked(&self, now: DateTime<Utc>) -> Self {
        Self {
            version: self.version.saturating_add(1),
            updated_at: Some(now),
            ..self.clone()
        }
    }

    /// State after propagating `quantity` to the children.
    #[must_use]
    pub fn synced(&self, quantity: i64, now: DateTime<Utc>) -> Self {
        Self {
            last_quantity: Some(quantity),
            last_synced_at: Some(now),
            ..self.clone()
        }
    }
}

/// A master product and its ordered, unique children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductLinkage {
    #[serde(rename = "masterProductId")]
    master: ProductId,
    #[serde(rename = "childProductIds")]
    children: Vec<ProductId>,
    state: SyncState,
}

impl ProductLinkage {
    /// Build a linkage, enforcing that children are unique and never the master.
    ///
    /// An empty child list is allowed here: a stored linkage may legitimately
    /// have no children left.
    ///
    /// # Errors
    ///
    /// Returns `LinkageError::SelfLink` or `LinkageError::DuplicateChild`.
    pub fn new(
        master: ProductId,
        children: Vec<ProductId>,
        state: SyncState,
    ) -> Result<Self, LinkageError> {
        let mut seen = HashSet::with_capacity(children.len());
        for child in &children {
            if *child == master {
                return Err(LinkageError::SelfLink(child.clone()));
            }
            if !seen.insert(child) {
                return Err(LinkageError::DuplicateChild(child.clone()));
            }
        }

        Ok(Self {
            master,
            children,
            state,
        })
    }

    /// Validate a request to link `children` under `master`.
    ///
    /// Same rules as [`ProductLinkage::new`] plus a non-empty child list.
    ///
    /// # Errors
    ///
    /// Returns `LinkageError::EmptyChildren` for an empty request, otherwise
    /// whatever [`ProductLinkage::new`] rejects.
    pub fn requested(
        master: ProductId,
        children: Vec<ProductId>,
        state: SyncState,
    ) -> Result<Self, LinkageError> {
        if children.is_empty() {
            return Err(LinkageError::EmptyChildren);
        }
        Self::new(master, children, state)
    }

    /// The master product.
    #[must_use]
    pub const fn master(&self) -> &ProductId {
        &self.master
    }

    /// Children in stored order.
    #[must_use]
    pub fn children(&self) -> &[ProductId] {
        &self.children
    }

    /// Linkage bookkeeping.
    #[must_use]
    pub const fn state(&self) -> &SyncState {
        &self.state
    }

    /// Replace the bookkeeping.
    #[must_use]
    pub fn with_state(self, state: SyncState) -> Self {
        Self { state, ..self }
    }

    /// Whether `product` is one of the children.
    #[must_use]
    pub fn contains(&self, product: &ProductId) -> bool {
        self.children.contains(product)
    }

    /// Children of `previous` that are not part of this linkage, in their
    /// previous order.
    #[must_use]
    pub fn released_from(&self, previous: &[ProductId]) -> Vec<ProductId> {
        previous
            .iter()
            .filter(|child| !self.contains(child))
            .cloned()
            .collect()
    }
}
